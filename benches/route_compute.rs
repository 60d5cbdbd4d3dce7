// CLASSIFICATION: COMMUNITY
// Filename: route_compute.rs v0.2
// Date Modified: 2026-08-19
// Author: Lukas Bower

use criterion::{criterion_group, criterion_main, Criterion};

use ctlspace_codec::Uuid128;
use latticefm::config::RoutingConfig;
use latticefm::fabric::component::{CState, Component};
use latticefm::fabric::interface::{IState, PhyState};
use latticefm::lattice_types::{CompClass, ComponentId, Gcid};
use latticefm::topo::graph::Topology;
use latticefm::topo::paths::compute_paths;

fn component(serial: u64, class: CompClass, nifaces: u16) -> Component {
    let mut c = Component::new(
        Uuid128::from_value(u128::from(serial) | 0xbe11_0000),
        serial,
        Uuid128::from_value(u128::from(serial)),
        class,
        nifaces,
    );
    c.gcid = Some(Gcid::new(0, serial as u16));
    c.cstate = CState::Up;
    c.usable = true;
    for i in &mut c.ifaces {
        i.istate = IState::Up;
        i.phy = PhyState::Up;
        i.usable = true;
    }
    c
}

/// Ladder of `rungs` switch pairs between a bridge and a memory endpoint:
/// many same-length alternatives, the worst case for the path search.
fn ladder(rungs: usize) -> (Topology, ComponentId, ComponentId) {
    let mut topo = Topology::new();
    let src = topo.insert(component(1, CompClass::Bridge, 2));
    let dst = topo.insert(component(2, CompClass::Memory, 2));
    let mut left = src;
    let mut right = src;
    for r in 0..rungs {
        let serial = 10 + 2 * r as u64;
        let a = topo.insert(component(serial, CompClass::Switch, 4));
        let b = topo.insert(component(serial + 1, CompClass::Switch, 4));
        topo.add_edge(left, if r == 0 { 0 } else { 1 }, a, 0, false);
        topo.add_edge(right, if r == 0 { 1 } else { 2 }, b, 0, false);
        topo.add_edge(a, 3, b, 3, false);
        left = a;
        right = b;
    }
    topo.add_edge(left, 1, dst, 0, false);
    topo.add_edge(right, 2, dst, 1, false);
    (topo, src, dst)
}

fn bench_route_compute(c: &mut Criterion) {
    let (topo, src, dst) = ladder(6);
    let cfg = RoutingConfig {
        min_paths: 4,
        cutoff_factor: 2.0,
        max_routes: None,
    };
    c.bench_function("route_compute_ladder", |b| {
        b.iter(|| {
            let paths = compute_paths(&topo, src, dst, &cfg);
            assert!(!paths.is_empty());
            paths.len()
        });
    });
}

criterion_group!(benches, bench_route_compute);
criterion_main!(benches);
