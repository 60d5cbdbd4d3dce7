// CLASSIFICATION: COMMUNITY
// Filename: snapshot.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-10

//! Serializable state snapshots.
//!
//! A snapshot is the manager's exportable view: components, links, and
//! programmed routes. The daemon emits it as JSON for the CLI and for the
//! secondary manager's state sync; it carries no hardware shadow state, so
//! re-importing one never implies any control-space writes.

use serde::{Deserialize, Serialize};

use crate::lattice_types::{CompClass, Gcid, IfaceNum};
use crate::topo::graph::Topology;
use crate::topo::route::Route;
use crate::topo::table::RouteTable;

/// One component as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Arena slot index.
    pub index: usize,
    /// Component class.
    pub class: CompClass,
    /// Fabric address, if assigned.
    pub gcid: Option<Gcid>,
    /// Stable class UUID, hex.
    pub class_uuid: String,
    /// Stable serial number.
    pub serial: u64,
    /// FRU identifier, hex.
    pub fru_uuid: String,
    /// Raw lifecycle state code.
    pub cstate: u64,
    /// Whether routing may traverse this component.
    pub usable: bool,
    /// Usable interface numbers.
    pub up_ifaces: Vec<IfaceNum>,
}

/// One link as exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    /// Arena indices and interface numbers of both ends.
    pub a: (usize, IfaceNum),
    /// Second endpoint.
    pub b: (usize, IfaceNum),
    /// Whether this is a directed-relay edge.
    pub relay: bool,
    /// Whether routing may traverse it right now.
    pub usable: bool,
}

/// Programmed routes for one source/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSnapshot {
    /// Source address.
    pub src: Gcid,
    /// Destination address.
    pub dst: Gcid,
    /// Routes, shortest first.
    pub routes: Vec<Route>,
}

/// One access partition as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// Access key.
    pub akey: u8,
    /// Member addresses.
    pub members: Vec<Gcid>,
}

/// One resource key domain as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    /// Resource key.
    pub key: u8,
    /// Member arena indices.
    pub members: Vec<usize>,
}

/// Complete exportable manager state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FabricSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// Components by arena order.
    pub components: Vec<ComponentSnapshot>,
    /// Links by arena order.
    pub edges: Vec<EdgeSnapshot>,
    /// Route sets, sorted by pair for stable output.
    pub pairs: Vec<PairSnapshot>,
    /// Access partitions, filled in by the coordinator.
    #[serde(default)]
    pub partitions: Vec<PartitionSnapshot>,
    /// Resource key domains, filled in by the coordinator.
    #[serde(default)]
    pub domains: Vec<DomainSnapshot>,
}

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

impl FabricSnapshot {
    /// Capture the current topology and route set.
    #[must_use]
    pub fn capture(topo: &Topology, routes: &RouteTable) -> Self {
        let components = topo
            .components()
            .map(|c| ComponentSnapshot {
                index: c.id.index(),
                class: c.class,
                gcid: c.gcid,
                class_uuid: format!("{:032x}", c.class_uuid.value()),
                serial: c.serial,
                fru_uuid: format!("{:032x}", c.fru_uuid.value()),
                cstate: c.cstate.to_raw(),
                usable: c.usable,
                up_ifaces: c
                    .ifaces
                    .iter()
                    .filter(|i| i.is_usable())
                    .map(|i| i.num)
                    .collect(),
            })
            .collect();
        let edges = topo
            .edges()
            .map(|(id, e)| EdgeSnapshot {
                a: (e.a.0.index(), e.a.1),
                b: (e.b.0.index(), e.b.1),
                relay: e.relay,
                usable: topo.edge_usable(id),
            })
            .collect();
        let mut pairs: Vec<PairSnapshot> = routes
            .pairs()
            .into_iter()
            .map(|(src, dst)| PairSnapshot {
                src,
                dst,
                routes: routes.routes_for(src, dst).into_iter().cloned().collect(),
            })
            .collect();
        pairs.sort_by_key(|p| (p.src, p.dst));
        Self {
            version: SNAPSHOT_VERSION,
            components,
            edges,
            pairs,
            partitions: Vec::new(),
            domains: Vec::new(),
        }
    }
}
