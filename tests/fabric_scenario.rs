// CLASSIFICATION: COMMUNITY
// Filename: fabric_scenario.rs v0.6
// Date Modified: 2026-08-19
// Author: Lukas Bower

//! End-to-end fabric scenarios over the in-memory model.

use ctlspace_codec::Uuid128;
use latticefm::config::{FabricConfig, SimComponent};
use latticefm::hw::model::ModelFabric;
use latticefm::lattice_types::{CompClass, Gcid};
use latticefm::manager::coordinator::Coordinator;
use latticefm::manager::events::{EventRecord, EV_IFACE_DOWN};
use latticefm::manager::heartbeat::Role;

fn sim(name: &str, class: &str, links: &[&str]) -> SimComponent {
    SimComponent {
        name: name.into(),
        class: class.into(),
        links: links.iter().map(|l| (*l).into()).collect(),
    }
}

/// br0 -- sw0 -- mem0 chain.
fn chain_config() -> FabricConfig {
    let mut cfg = FabricConfig::default();
    cfg.topology = vec![
        sim("br0", "bridge", &["0:sw0:0"]),
        sim("sw0", "switch", &["1:mem0:0"]),
        sim("mem0", "memory", &[]),
    ];
    cfg
}

fn coordinator_for(cfg: FabricConfig, model: ModelFabric) -> Coordinator {
    let bridges = model.bridge_count();
    Coordinator::new(
        Box::new(model),
        cfg,
        Uuid128::from_value(0x1a77_1cef),
        bridges,
        Role::Primary,
    )
}

fn gcid_of(coord: &Coordinator, class: CompClass) -> Gcid {
    coord
        .snapshot()
        .components
        .iter()
        .find(|c| c.class == class)
        .and_then(|c| c.gcid)
        .expect("addressed component")
}

#[test]
fn chain_discovers_routes_and_survives_link_failure() {
    let cfg = chain_config();
    let model = ModelFabric::from_config(&cfg.topology).expect("model");
    let mut coord = coordinator_for(cfg, model);

    assert_eq!(coord.discover().expect("discover"), 3);
    let bridge = gcid_of(&coord, CompClass::Bridge);
    let memory = gcid_of(&coord, CompClass::Memory);
    let switch = gcid_of(&coord, CompClass::Switch);

    // One path exists; it is programmed in both directions.
    assert_eq!(coord.connect(bridge, memory, true).expect("connect"), 1);
    let snap = coord.snapshot();
    assert_eq!(snap.pairs.len(), 2);
    let forward = snap
        .pairs
        .iter()
        .find(|p| p.src == bridge && p.dst == memory)
        .expect("forward pair");
    assert_eq!(forward.routes.len(), 1);
    assert_eq!(forward.routes[0].hop_count(), 2);
    assert_eq!(forward.routes[0].hops[1].gcid, switch);

    // The switch loses its memory-side link.
    coord.handle_event(&EventRecord::iface_event(EV_IFACE_DOWN, switch, 1));

    let snap = coord.snapshot();
    assert!(snap.pairs.iter().all(|p| p.routes.is_empty()) || snap.pairs.is_empty());
    assert!(coord.unreachable().contains(&(bridge, memory)));
    assert!(coord.unreachable().contains(&(memory, bridge)));

    // The degraded link is visible in the exported topology.
    assert!(snap.edges.iter().any(|e| !e.usable));
}

#[test]
fn redundant_paths_recover_from_link_failure() {
    // br0 -- sw0 with two parallel links, then sw0 -- mem0.
    let mut cfg = chain_config();
    cfg.topology[0] = sim("br0", "bridge", &["0:sw0:0", "1:sw0:2"]);
    let model = ModelFabric::from_config(&cfg.topology).expect("model");
    let mut coord = coordinator_for(cfg, model);

    assert_eq!(coord.discover().expect("discover"), 3);
    let bridge = gcid_of(&coord, CompClass::Bridge);
    let memory = gcid_of(&coord, CompClass::Memory);

    // Both parallel variants are admitted.
    assert_eq!(coord.connect(bridge, memory, false).expect("connect"), 2);

    // Losing one bridge uplink leaves the other route standing.
    coord.handle_event(&EventRecord::iface_event(EV_IFACE_DOWN, bridge, 0));
    let snap = coord.snapshot();
    let forward = snap
        .pairs
        .iter()
        .find(|p| p.src == bridge && p.dst == memory)
        .expect("forward pair");
    assert_eq!(forward.routes.len(), 1);
    assert!(coord.unreachable().is_empty());
}

#[test]
fn sentinel_component_leaves_siblings_usable() {
    let mut cfg = chain_config();
    cfg.topology[1] = sim("sw0", "switch", &["1:mem0:0", "2:mem1:0"]);
    cfg.topology.push(sim("mem1", "memory", &[]));
    let mut model = ModelFabric::from_config(&cfg.topology).expect("model");
    // mem1 is the fourth configured component.
    model.force_sentinel(3);
    let mut coord = coordinator_for(cfg, model);

    // The dead sibling is skipped; the rest of the fabric comes up.
    assert_eq!(coord.discover().expect("discover"), 3);
    let bridge = gcid_of(&coord, CompClass::Bridge);
    let memory = gcid_of(&coord, CompClass::Memory);
    assert_eq!(coord.connect(bridge, memory, false).expect("connect"), 1);

    // The switch's egress toward the dead peer is marked unusable.
    let snap = coord.snapshot();
    let switch = snap
        .components
        .iter()
        .find(|c| c.class == CompClass::Switch)
        .expect("switch");
    assert!(!switch.up_ifaces.contains(&2));
}
