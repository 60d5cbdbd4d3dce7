// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-07-15

//! Fabric manager configuration.
//!
//! Loaded from a TOML file named by `LATTICEFM_CONFIG` (or a path passed on
//! the command line); every field has a default so an empty file is valid.
//! `LATTICEFM_SUBNET` overrides the subnet id for multi-manager test rigs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FabricError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Subnet id this manager owns.
    pub subnet: u16,
    /// Routing parameters.
    pub routing: RoutingConfig,
    /// Link-control polling parameters.
    pub link: LinkConfig,
    /// Primary-manager heartbeat parameters.
    pub heartbeat: HeartbeatConfig,
    /// Simulated topology for the model fabric; empty outside sim mode.
    pub topology: Vec<SimComponent>,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            subnet: 0,
            routing: RoutingConfig::default(),
            link: LinkConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            topology: Vec::new(),
        }
    }
}

/// Path-search and route-count limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Minimum number of shortest paths to request per pair.
    pub min_paths: usize,
    /// Admit extra paths no longer than `cutoff_factor` times the shortest.
    pub cutoff_factor: f64,
    /// Optional cap on programmed routes per pair; excess torn down
    /// longest first.
    pub max_routes: Option<usize>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_paths: 2,
            cutoff_factor: 2.0,
            max_routes: None,
        }
    }
}

/// Poll interval and hard deadline for link-control operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fixed poll interval in milliseconds.
    pub poll_ms: u64,
    /// Hard deadline in milliseconds; expiry is a terminal bring-up failure.
    pub timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_ms: 2,
            timeout_ms: 200,
        }
    }
}

/// Primary-manager liveness checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Check period in milliseconds.
    pub period_ms: u64,
    /// Missed checks tolerated before secondary promotes itself.
    pub miss_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period_ms: 250,
            miss_threshold: 4,
        }
    }
}

/// One simulated component in the model fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimComponent {
    /// Name used in the config's link stanzas.
    pub name: String,
    /// Component class.
    pub class: String,
    /// Links as `"iface:peer_name:peer_iface"` triples.
    #[serde(default)]
    pub links: Vec<String>,
}

impl FabricConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, FabricError> {
        let text = fs::read_to_string(path)
            .map_err(|e| FabricError::Config(format!("{}: {e}", path.display())))?;
        let mut cfg: FabricConfig =
            toml::from_str(&text).map_err(|e| FabricError::Config(e.to_string()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Apply `LATTICEFM_*` environment overrides to an existing config.
    pub fn apply_env(&mut self) {
        if let Ok(subnet) = std::env::var("LATTICEFM_SUBNET") {
            if let Ok(v) = subnet.parse() {
                self.subnet = v;
            }
        }
    }
}
