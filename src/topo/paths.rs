// CLASSIFICATION: COMMUNITY
// Filename: paths.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-08-05

//! Multi-path search over the topology.
//!
//! Candidate paths are simple (no repeated component) and use only usable
//! edges. The selection rule admits the `min_paths` shortest candidates
//! unconditionally, then any further candidate whose length is within
//! `cutoff_factor` times the shortest. Parallel links yield distinct
//! candidates over the same component sequence.

use crate::config::RoutingConfig;
use crate::lattice_types::{ComponentId, EdgeId};
use crate::topo::graph::Topology;

/// One candidate path: `comps` has one more element than `edges`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCandidate {
    /// Component sequence from source to destination inclusive.
    pub comps: Vec<ComponentId>,
    /// Edge taken between each consecutive component pair.
    pub edges: Vec<EdgeId>,
}

impl PathCandidate {
    /// Number of links traversed.
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// Enumerate and select candidate paths from `src` to `dst`.
///
/// Returns candidates sorted shortest-first; empty when the pair is
/// disconnected. Relay edges are excluded: routed traffic needs both
/// endpoint interfaces up, which relay addressing does not.
#[must_use]
pub fn compute_paths(
    topo: &Topology,
    src: ComponentId,
    dst: ComponentId,
    cfg: &RoutingConfig,
) -> Vec<PathCandidate> {
    if src == dst {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut comps = vec![src];
    let mut edges = Vec::new();
    walk(topo, src, dst, &mut comps, &mut edges, &mut found);

    found.sort_by(|a, b| {
        a.hop_count()
            .cmp(&b.hop_count())
            .then_with(|| a.edges.cmp(&b.edges))
    });
    let Some(shortest) = found.first().map(PathCandidate::hop_count) else {
        return Vec::new();
    };

    #[allow(clippy::cast_precision_loss)]
    let cutoff = (shortest as f64) * cfg.cutoff_factor;
    found
        .into_iter()
        .enumerate()
        .filter(|(i, p)| *i < cfg.min_paths || (p.hop_count() as f64) <= cutoff)
        .map(|(_, p)| p)
        .collect()
}

fn walk(
    topo: &Topology,
    here: ComponentId,
    dst: ComponentId,
    comps: &mut Vec<ComponentId>,
    edges: &mut Vec<EdgeId>,
    found: &mut Vec<PathCandidate>,
) {
    for (eid, peer) in topo.neighbors(here) {
        if topo.edge(eid).map_or(true, |e| e.relay) {
            continue;
        }
        if peer == dst {
            let mut comps = comps.clone();
            comps.push(dst);
            let mut edges = edges.clone();
            edges.push(eid);
            found.push(PathCandidate { comps, edges });
            continue;
        }
        if comps.contains(&peer) {
            continue;
        }
        // Only switches forward routed traffic mid-path.
        let forwards = topo
            .component(peer)
            .is_some_and(|c| crate::fabric::component::class_ops(c.class).is_expandable());
        if !forwards {
            continue;
        }
        comps.push(peer);
        edges.push(eid);
        walk(topo, peer, dst, comps, edges, found);
        comps.pop();
        edges.pop();
    }
}
