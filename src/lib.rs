// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v1.0
// Date Modified: 2026-08-17
// Author: Lukas Bower

//! Root library for the latticefm fabric manager.
//!
//! latticefm discovers and operates a switched point-to-point interconnect:
//! it crawls the fabric from the local bridges, brings components and links
//! through their configuration state machines, programs multi-path
//! forwarding tables, and hands out access and resource keys.

/// Fabric manager configuration.
pub mod config;

/// Error taxonomy.
pub mod error;

/// Component and interface state machines, bring-up, and discovery.
pub mod fabric;

/// Control-space access layer and the in-memory fabric model.
pub mod hw;

/// Access-key partitions and resource key domains.
pub mod keys;

/// Common cross-module types.
pub mod lattice_types;

/// Coordinator thread, watchdog, events, and manager sync.
pub mod manager;

/// Topology graph, routing, table programming, and snapshots.
pub mod topo;

pub use error::{FabricError, Result};
