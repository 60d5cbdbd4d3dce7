// CLASSIFICATION: COMMUNITY
// Filename: manager_failover.rs v0.4
// Date Modified: 2026-08-19
// Author: Lukas Bower

//! Secondary-manager promotion and state synchronization.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use ctlspace_codec::Uuid128;
use latticefm::config::{FabricConfig, HeartbeatConfig, SimComponent};
use latticefm::hw::model::ModelFabric;
use latticefm::lattice_types::CompClass;
use latticefm::manager::coordinator::{Command, Coordinator};
use latticefm::manager::heartbeat::{Role, Watchdog};
use latticefm::manager::sync::SyncShadow;

fn chain_config() -> FabricConfig {
    let mut cfg = FabricConfig::default();
    cfg.topology = vec![
        SimComponent {
            name: "br0".into(),
            class: "bridge".into(),
            links: vec!["0:sw0:0".into()],
        },
        SimComponent {
            name: "sw0".into(),
            class: "switch".into(),
            links: vec!["1:mem0:0".into()],
        },
        SimComponent {
            name: "mem0".into(),
            class: "memory".into(),
            links: vec![],
        },
    ];
    cfg
}

fn coordinator(role: Role) -> Coordinator {
    let cfg = chain_config();
    let model = ModelFabric::from_config(&cfg.topology).expect("model");
    let bridges = model.bridge_count();
    Coordinator::new(
        Box::new(model),
        cfg,
        Uuid128::from_value(0xabad_cafe),
        bridges,
        role,
    )
}

#[test]
fn silent_primary_promotes_the_secondary() {
    let coord = coordinator(Role::Secondary);
    let pulse = coord.pulse();
    let (tx, handle) = coord.spawn();

    let hb = HeartbeatConfig {
        period_ms: 5,
        miss_threshold: 3,
    };
    let (promote_tx, promote_rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let dog = Watchdog::new(pulse, &hb).run(promote_tx, Arc::clone(&stop));

    promote_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("promotion signal");
    tx.send(Command::Promote).expect("send promote");
    tx.send(Command::Shutdown).expect("send shutdown");
    let coord = handle.join().expect("join coordinator");
    dog.join().expect("join watchdog");
    assert_eq!(coord.role(), Role::Primary);
}

#[test]
fn sync_records_rebuild_the_shadow() {
    let mut primary = coordinator(Role::Primary);
    primary.discover().expect("discover");
    let snap = primary.snapshot();
    let bridge = snap
        .components
        .iter()
        .find(|c| c.class == CompClass::Bridge)
        .and_then(|c| c.gcid)
        .expect("bridge");
    let memory = snap
        .components
        .iter()
        .find(|c| c.class == CompClass::Memory)
        .and_then(|c| c.gcid)
        .expect("memory");

    primary.connect(bridge, memory, false).expect("connect");
    let akey = primary
        .partition_create(vec![bridge, memory])
        .expect("partition");

    let mut shadow = SyncShadow::new();
    let ops = primary.drain_sync();
    assert!(!ops.is_empty());
    for op in &ops {
        shadow.apply(op);
    }
    // Redelivering the whole stream changes nothing.
    for op in &ops {
        assert!(!shadow.apply(op));
    }

    assert_eq!(shadow.routes().len(), 1);
    assert_eq!(shadow.routes()[0].src, bridge);
    assert_eq!(
        shadow.partition(akey).map(<[_]>::len),
        Some(2)
    );
}
