// CLASSIFICATION: COMMUNITY
// Filename: graph.rs v0.8
// Author: Lukas Bower
// Date Modified: 2026-08-04

//! Topology arena.
//!
//! The fabric is an undirected multigraph: components are arena slots,
//! physical links are edges labeled with the two incident interfaces. The
//! structure is cyclic (interface -> component -> interface), so everything
//! is handle-indexed; nothing owns anything else.

use std::collections::HashMap;

use ctlspace_codec::Uuid128;
use log::debug;

use crate::fabric::component::Component;
use crate::fabric::interface::{Interface, PeerRef};
use crate::lattice_types::{ComponentId, EdgeId, Gcid, IfaceNum};

/// One physical link between two interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// First incident `(component, interface)`.
    pub a: (ComponentId, IfaceNum),
    /// Second incident `(component, interface)`.
    pub b: (ComponentId, IfaceNum),
    /// Directed-relay edges are always traversable, independent of
    /// interface usability.
    pub relay: bool,
}

impl Edge {
    /// The far endpoint as seen from `from`, if `from` is incident.
    #[must_use]
    pub fn other(&self, from: ComponentId) -> Option<(ComponentId, IfaceNum)> {
        if self.a.0 == from {
            Some(self.b)
        } else if self.b.0 == from {
            Some(self.a)
        } else {
            None
        }
    }

    /// The local interface on `comp`, if incident.
    #[must_use]
    pub fn iface_on(&self, comp: ComponentId) -> Option<IfaceNum> {
        if self.a.0 == comp {
            Some(self.a.1)
        } else if self.b.0 == comp {
            Some(self.b.1)
        } else {
            None
        }
    }
}

/// The discovered fabric.
#[derive(Debug, Default)]
pub struct Topology {
    comps: Vec<Option<Component>>,
    edges: Vec<Option<Edge>>,
    by_identity: HashMap<(u128, u64), ComponentId>,
    by_gcid: HashMap<Gcid, ComponentId>,
}

impl Topology {
    /// Empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, assigning its arena handle.
    pub fn insert(&mut self, mut comp: Component) -> ComponentId {
        let id = ComponentId(self.comps.len());
        comp.id = id;
        self.by_identity
            .insert((comp.class_uuid.value(), comp.serial), id);
        if let Some(gcid) = comp.gcid {
            self.by_gcid.insert(gcid, id);
        }
        debug!("topology: insert {id} ({}) as {:?}", comp.class, comp.gcid);
        self.comps.push(Some(comp));
        id
    }

    /// Remove a component and every edge touching it.
    pub fn remove(&mut self, id: ComponentId) -> Option<Component> {
        let comp = self.comps.get_mut(id.0)?.take()?;
        self.by_identity
            .remove(&(comp.class_uuid.value(), comp.serial));
        if let Some(gcid) = comp.gcid {
            self.by_gcid.remove(&gcid);
        }
        for slot in &mut self.edges {
            if slot.is_some_and(|e| e.a.0 == id || e.b.0 == id) {
                *slot = None;
            }
        }
        Some(comp)
    }

    /// Borrow a component.
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.comps.get(id.0).and_then(Option::as_ref)
    }

    /// Mutably borrow a component.
    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.comps.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Iterate live components.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.comps.iter().filter_map(Option::as_ref)
    }

    /// Look up by stable identity.
    #[must_use]
    pub fn find_by_identity(&self, class_uuid: Uuid128, serial: u64) -> Option<ComponentId> {
        self.by_identity
            .get(&(class_uuid.value(), serial))
            .copied()
            .filter(|id| self.component(*id).is_some())
    }

    /// Look up by fabric address.
    #[must_use]
    pub fn find_by_gcid(&self, gcid: Gcid) -> Option<ComponentId> {
        self.by_gcid
            .get(&gcid)
            .copied()
            .filter(|id| self.component(*id).is_some())
    }

    /// Add an edge and set both interfaces' weak peer references. Missing
    /// interface records are created in the Down state.
    pub fn add_edge(
        &mut self,
        a: ComponentId,
        ai: IfaceNum,
        b: ComponentId,
        bi: IfaceNum,
        relay: bool,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(Some(Edge {
            a: (a, ai),
            b: (b, bi),
            relay,
        }));
        self.set_peer(a, ai, PeerRef { comp: b, iface: bi });
        self.set_peer(b, bi, PeerRef { comp: a, iface: ai });
        debug!("topology: edge {id} {a}.{ai} <-> {b}.{bi}");
        id
    }

    fn set_peer(&mut self, comp: ComponentId, iface: IfaceNum, peer: PeerRef) {
        if let Some(c) = self.component_mut(comp) {
            if c.iface(iface).is_none() {
                c.ifaces.push(Interface::down(iface));
            }
            if let Some(i) = c.iface_mut(iface) {
                i.peer = Some(peer);
            }
        }
    }

    /// Whether an edge between these exact interface pairs already exists.
    #[must_use]
    pub fn linked(&self, a: ComponentId, ai: IfaceNum, b: ComponentId, bi: IfaceNum) -> bool {
        self.edges.iter().flatten().any(|e| {
            (e.a == (a, ai) && e.b == (b, bi)) || (e.a == (b, bi) && e.b == (a, ai))
        })
    }

    /// Borrow an edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0).and_then(Option::as_ref)
    }

    /// Iterate live edges.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EdgeId(i), e)))
    }

    /// All edges joining `a` and `b`, in arena order.
    #[must_use]
    pub fn edges_between(&self, a: ComponentId, b: ComponentId) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, e)| {
                (e.a.0 == a && e.b.0 == b) || (e.a.0 == b && e.b.0 == a)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// The edge attached at `(comp, iface)`, if any.
    #[must_use]
    pub fn iface_edge(&self, comp: ComponentId, iface: IfaceNum) -> Option<EdgeId> {
        self.edges()
            .find(|(_, e)| e.a == (comp, iface) || e.b == (comp, iface))
            .map(|(id, _)| id)
    }

    /// Whether routing may traverse an edge: relay edges always; others
    /// need both endpoint components and interfaces usable.
    #[must_use]
    pub fn edge_usable(&self, id: EdgeId) -> bool {
        let Some(edge) = self.edge(id) else {
            return false;
        };
        if edge.relay {
            return true;
        }
        let end_ok = |(c, i): (ComponentId, IfaceNum)| {
            self.component(c)
                .is_some_and(|comp| comp.usable && comp.iface(i).is_some_and(Interface::is_usable))
        };
        end_ok(edge.a) && end_ok(edge.b)
    }

    /// Usable neighbours of `id` as `(edge, peer)` pairs.
    #[must_use]
    pub fn neighbors(&self, id: ComponentId) -> Vec<(EdgeId, ComponentId)> {
        self.edges()
            .filter(|(eid, _)| self.edge_usable(*eid))
            .filter_map(|(eid, e)| e.other(id).map(|(peer, _)| (eid, peer)))
            .collect()
    }

    /// Drop a link: both interfaces go Down, peer references clear, and the
    /// owning components' usability is recomputed.
    pub fn mark_link_down(&mut self, id: EdgeId) {
        let Some(edge) = self.edge(id).copied() else {
            return;
        };
        for (comp, iface) in [edge.a, edge.b] {
            if let Some(c) = self.component_mut(comp) {
                if let Some(i) = c.iface_mut(iface) {
                    i.mark_down();
                }
                c.usable = c.compute_usable();
            }
        }
    }
}
