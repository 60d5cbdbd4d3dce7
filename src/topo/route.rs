// CLASSIFICATION: COMMUNITY
// Filename: route.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-05

//! Concrete routes over candidate paths.
//!
//! A route binds a candidate path to fabric addresses: one hop per
//! component that must carry a forwarding row, each with the egress
//! interface toward the next component. The destination itself carries no
//! hop. Routes compare by content, so re-submitting the same path is
//! detectable without handle identity.

use serde::{Deserialize, Serialize};

use crate::error::{FabricError, Result};
use crate::lattice_types::{ComponentId, EdgeId, Gcid, IfaceNum};
use crate::topo::graph::Topology;
use crate::topo::paths::PathCandidate;

/// One forwarding row to program: on `comp`, destination traffic leaves
/// through `egress` over `edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// Component carrying the row.
    pub comp: ComponentId,
    /// Its fabric address at programming time.
    pub gcid: Gcid,
    /// Egress interface toward the next component.
    pub egress: IfaceNum,
    /// Link traversed.
    pub edge: EdgeId,
}

/// A programmed (or programmable) unidirectional route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Source address.
    pub src: Gcid,
    /// Destination address; forwarding rows key on its component id.
    pub dst: Gcid,
    /// Destination component handle.
    pub dst_comp: ComponentId,
    /// Rows in source-to-destination order.
    pub hops: Vec<Hop>,
}

impl Route {
    /// Bind a candidate path to addresses. Fails with [`FabricError::Unreachable`]
    /// if any component on the path has lost its address.
    pub fn from_candidate(topo: &Topology, cand: &PathCandidate) -> Result<Self> {
        let gcid_of = |id: ComponentId| -> Result<Gcid> {
            topo.component(id)
                .and_then(|c| c.gcid)
                .ok_or_else(|| unreachable_err(topo, cand))
        };
        let (first, last) = match (cand.comps.first(), cand.comps.last()) {
            (Some(f), Some(l)) if cand.comps.len() == cand.edges.len() + 1 => (*f, *l),
            _ => return Err(FabricError::Config("malformed path candidate".into())),
        };
        let src = gcid_of(first)?;
        let dst = gcid_of(last)?;

        let mut hops = Vec::with_capacity(cand.edges.len());
        for (i, &edge) in cand.edges.iter().enumerate() {
            let comp = cand.comps[i];
            let egress = topo
                .edge(edge)
                .and_then(|e| e.iface_on(comp))
                .ok_or_else(|| unreachable_err(topo, cand))?;
            hops.push(Hop {
                comp,
                gcid: gcid_of(comp)?,
                egress,
                edge,
            });
        }
        Ok(Self {
            src,
            dst,
            dst_comp: last,
            hops,
        })
    }

    /// Number of links traversed.
    #[must_use]
    pub fn hop_count(&self) -> u8 {
        self.hops.len().min(u8::MAX as usize) as u8
    }

    /// Whether any hop traverses `edge`.
    #[must_use]
    pub fn uses_edge(&self, edge: EdgeId) -> bool {
        self.hops.iter().any(|h| h.edge == edge)
    }

    /// The destination-to-source inverse of this route over the same links.
    pub fn invert(&self, topo: &Topology) -> Result<Self> {
        let mut hops = Vec::with_capacity(self.hops.len());
        let mut prev = self.dst_comp;
        for hop in self.hops.iter().rev() {
            let edge = topo
                .edge(hop.edge)
                .ok_or(FabricError::Unreachable {
                    src: self.dst,
                    dst: self.src,
                })?;
            let (egress, next) = match edge.other(prev) {
                Some((next, _)) => (
                    edge.iface_on(prev).ok_or(FabricError::Unreachable {
                        src: self.dst,
                        dst: self.src,
                    })?,
                    next,
                ),
                None => {
                    return Err(FabricError::Unreachable {
                        src: self.dst,
                        dst: self.src,
                    })
                }
            };
            let gcid = topo
                .component(prev)
                .and_then(|c| c.gcid)
                .ok_or(FabricError::Unreachable {
                    src: self.dst,
                    dst: self.src,
                })?;
            hops.push(Hop {
                comp: prev,
                gcid,
                egress,
                edge: hop.edge,
            });
            prev = next;
        }
        Ok(Self {
            src: self.dst,
            dst: self.src,
            dst_comp: prev,
            hops,
        })
    }
}

fn unreachable_err(topo: &Topology, cand: &PathCandidate) -> FabricError {
    let gcid_or_zero = |id: Option<&ComponentId>| {
        id.and_then(|id| topo.component(*id))
            .and_then(|c| c.gcid)
            .unwrap_or(Gcid { sid: 0, cid: 0 })
    };
    FabricError::Unreachable {
        src: gcid_or_zero(cand.comps.first()),
        dst: gcid_or_zero(cand.comps.last()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlspace_codec::Uuid128;

    use crate::fabric::component::{CState, Component};
    use crate::fabric::interface::{IState, Interface, PhyState};
    use crate::lattice_types::CompClass;

    fn comp(topo: &mut Topology, class: CompClass, serial: u64, nifaces: u16) -> ComponentId {
        topo.insert(Component {
            id: ComponentId(0),
            class_uuid: Uuid128::from_value(u128::from(serial) | 0xee00),
            serial,
            fru_uuid: Uuid128::from_value(u128::from(serial)),
            class,
            gcid: Some(Gcid::new(0, serial as u16)),
            cstate: CState::Up,
            usable: true,
            ifaces: (0..nifaces)
                .map(|n| {
                    let mut i = Interface::down(n);
                    i.istate = IState::Up;
                    i.phy = PhyState::Up;
                    i.usable = true;
                    i
                })
                .collect(),
        })
    }

    fn chain() -> (Topology, PathCandidate) {
        let mut topo = Topology::new();
        let br = comp(&mut topo, CompClass::Bridge, 1, 1);
        let sw = comp(&mut topo, CompClass::Switch, 2, 2);
        let mem = comp(&mut topo, CompClass::Memory, 3, 1);
        let e0 = topo.add_edge(br, 0, sw, 0, false);
        let e1 = topo.add_edge(sw, 1, mem, 0, false);
        (
            topo,
            PathCandidate {
                comps: vec![br, sw, mem],
                edges: vec![e0, e1],
            },
        )
    }

    #[test]
    fn hops_carry_egress_toward_next() {
        let (topo, cand) = chain();
        let route = Route::from_candidate(&topo, &cand).expect("route");
        assert_eq!(route.hop_count(), 2);
        assert_eq!(route.hops[0].egress, 0);
        assert_eq!(route.hops[1].egress, 1);
        assert_eq!(route.dst, Gcid::new(0, 3));
    }

    #[test]
    fn inversion_swaps_endpoints_and_egress() {
        let (topo, cand) = chain();
        let route = Route::from_candidate(&topo, &cand).expect("route");
        let back = route.invert(&topo).expect("invert");
        assert_eq!(back.src, route.dst);
        assert_eq!(back.dst, route.src);
        assert_eq!(back.hop_count(), 2);
        // First inverse hop is the old destination, leaving via its side
        // of the last forward edge.
        assert_eq!(back.hops[0].comp, route.dst_comp);
        assert_eq!(back.hops[0].egress, 0);
        assert_eq!(back.hops[1].egress, 0);
        // Double inversion is the identity.
        assert_eq!(back.invert(&topo).expect("re-invert"), route);
    }

    #[test]
    fn unaddressed_component_fails_binding() {
        let (mut topo, cand) = chain();
        topo.component_mut(cand.comps[1]).expect("sw").gcid = None;
        assert!(matches!(
            Route::from_candidate(&topo, &cand),
            Err(FabricError::Unreachable { .. })
        ));
    }
}
