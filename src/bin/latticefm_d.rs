// CLASSIFICATION: COMMUNITY
// Filename: latticefm_d.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-08-18

//! Fabric manager daemon.
//!
//! Builds the in-memory fabric model from the configured topology
//! (simulation mode), discovers and routes it, then serves periodic
//! snapshot dumps. `--oneshot` does a single discover/route/dump pass and
//! exits, which is what the test rigs and CI use.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use latticefm::config::FabricConfig;
use latticefm::hw::model::ModelFabric;
use latticefm::lattice_types::{CompClass, Gcid};
use latticefm::manager::coordinator::{Command, Coordinator};
use latticefm::manager::heartbeat::{Role, Watchdog};
use latticefm::topo::snapshot::FabricSnapshot;
use ctlspace_codec::Uuid128;

#[derive(Parser)]
#[command(name = "latticefm_d", about = "Switched-fabric manager daemon")]
struct Cli {
    /// Configuration file; defaults come from LATTICEFM_CONFIG or built-ins.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where snapshot JSON is written.
    #[arg(long, default_value = "latticefm-snapshot.json")]
    snapshot: PathBuf,

    /// Discover, route, dump one snapshot, and exit.
    #[arg(long)]
    oneshot: bool,

    /// Start as the secondary manager (watchdog-promoted).
    #[arg(long)]
    secondary: bool,

    /// Snapshot period in seconds when running as a daemon.
    #[arg(long, default_value = "5")]
    snapshot_period: u64,
}

fn load_config(cli: &Cli) -> anyhow::Result<FabricConfig> {
    if let Some(path) = &cli.config {
        return FabricConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    if let Ok(path) = std::env::var("LATTICEFM_CONFIG") {
        return FabricConfig::load(path.as_ref()).with_context(|| format!("loading {path}"));
    }
    let mut cfg = FabricConfig::default();
    cfg.apply_env();
    Ok(cfg)
}

/// Route the first bridge to every endpoint, both directions.
fn route_initial(coord: &mut Coordinator) {
    let snap = coord.snapshot();
    let Some(src) = snap
        .components
        .iter()
        .find(|c| c.class == CompClass::Bridge)
        .and_then(|c| c.gcid)
    else {
        warn!("no addressed bridge, nothing to route");
        return;
    };
    let endpoints: Vec<Gcid> = snap
        .components
        .iter()
        .filter(|c| matches!(c.class, CompClass::Memory | CompClass::Accelerator) && c.usable)
        .filter_map(|c| c.gcid)
        .collect();
    for dst in endpoints {
        match coord.connect(src, dst, true) {
            Ok(n) => info!("{src} <-> {dst}: {n} route(s)"),
            Err(e) => warn!("{src} <-> {dst}: routing failed: {e}"),
        }
    }
}

fn write_snapshot(path: &PathBuf, snap: &FabricSnapshot) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(snap)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    if cfg.topology.is_empty() {
        anyhow::bail!("no [[topology]] stanzas configured; only simulation mode is supported");
    }

    let model = ModelFabric::from_config(&cfg.topology).context("building fabric model")?;
    let bridges = model.bridge_count();
    let mgr_uuid = Uuid128::from_value(rand::random());
    let role = if cli.secondary {
        Role::Secondary
    } else {
        Role::Primary
    };
    let heartbeat = cfg.heartbeat.clone();
    let mut coord = Coordinator::new(Box::new(model), cfg, mgr_uuid, bridges, role);

    let found = coord.discover().context("fabric discovery")?;
    info!("discovered {found} component(s)");
    if role == Role::Primary {
        route_initial(&mut coord);
    }
    write_snapshot(&cli.snapshot, &coord.snapshot())?;
    if cli.oneshot {
        return Ok(());
    }

    let pulse = coord.pulse();
    let (tx, handle) = coord.spawn();
    let stop = Arc::new(AtomicBool::new(false));
    if role == Role::Secondary {
        let (promote_tx, promote_rx) = mpsc::channel();
        let _watchdog = Watchdog::new(pulse, &heartbeat).run(promote_tx, Arc::clone(&stop));
        let tx = tx.clone();
        std::thread::spawn(move || {
            if promote_rx.recv().is_ok() {
                let _ = tx.send(Command::Promote);
            }
        });
    }

    loop {
        std::thread::sleep(Duration::from_secs(cli.snapshot_period));
        let (reply, rx) = mpsc::channel();
        if tx.send(Command::Snapshot(reply)).is_err() {
            break;
        }
        match rx.recv() {
            Ok(snap) => {
                if let Err(e) = write_snapshot(&cli.snapshot, &snap) {
                    warn!("snapshot dump failed: {e}");
                }
            }
            Err(_) => break,
        }
    }
    drop(tx);
    let _ = handle.join();
    Ok(())
}
