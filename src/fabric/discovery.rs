// CLASSIFICATION: COMMUNITY
// Filename: discovery.rs v1.0
// Author: Lukas Bower
// Date Modified: 2026-08-23

//! Fabric crawl.
//!
//! Discovery starts at the locally attached bridges and recurses through
//! each newly-Up component's interfaces, excluding the ingress the crawl
//! arrived on. Components still in C-CFG are reached by directed relay
//! through their already-Up neighbour. A peer that turns out to be an
//! already-known component at an unexpected interface is confirmed by nonce
//! before being recorded as a redundant path. Bring-up failures are local:
//! the affected unit is marked unusable and siblings continue.

use ctlspace_codec::{InterfaceStruct, Uuid128};
use log::{info, warn};

use crate::config::FabricConfig;
use crate::error::{FabricError, Result};
use crate::fabric::bringup::{bring_up_component, read_identity};
use crate::fabric::component::{class_ops, CState, Component};
use crate::fabric::interface::Interface;
use crate::fabric::link::LinkCtl;
use crate::hw::{read_struct, ControlSpace, CtlAddr, StructSel};
use crate::lattice_types::{ComponentId, Gcid, IfaceNum};
use crate::topo::graph::Topology;

/// Component-id allocator for one subnet. Id zero is reserved as the
/// unprogrammed value.
#[derive(Debug)]
pub struct CidAllocator {
    next: u16,
    free: Vec<u16>,
    max: u16,
}

impl CidAllocator {
    /// Allocator covering `1..=max`.
    #[must_use]
    pub fn new(max: u16) -> Self {
        Self {
            next: 1,
            free: Vec::new(),
            max,
        }
    }

    /// Take a free component id.
    pub fn alloc(&mut self) -> Result<u16> {
        if let Some(cid) = self.free.pop() {
            return Ok(cid);
        }
        if self.next > self.max {
            return Err(FabricError::Exhausted("component id slot"));
        }
        let cid = self.next;
        self.next += 1;
        Ok(cid)
    }

    /// Return a component id for reuse.
    pub fn release(&mut self, cid: u16) {
        if cid != 0 && !self.free.contains(&cid) {
            self.free.push(cid);
        }
    }
}

/// Crawl state over one control space.
pub struct Discovery<'a> {
    cs: &'a mut dyn ControlSpace,
    cfg: &'a FabricConfig,
    mgr_uuid: Uuid128,
}

impl<'a> Discovery<'a> {
    /// Borrow the control space and configuration for one crawl.
    pub fn new(cs: &'a mut dyn ControlSpace, cfg: &'a FabricConfig, mgr_uuid: Uuid128) -> Self {
        Self { cs, cfg, mgr_uuid }
    }

    /// Crawl the fabric starting at `bridge_count` local bridges, filling
    /// `topo`. Returns the handles of components discovered this pass.
    pub fn crawl(
        &mut self,
        topo: &mut Topology,
        cids: &mut CidAllocator,
        bridge_count: usize,
    ) -> Result<Vec<ComponentId>> {
        let mut discovered = Vec::new();
        let mut queue: Vec<(ComponentId, Option<IfaceNum>)> = Vec::new();

        for index in 0..bridge_count {
            let addr = CtlAddr::Local { index };
            match self.bring_up_at(topo, cids, addr) {
                Ok(id) => {
                    discovered.push(id);
                    queue.push((id, None));
                }
                Err(e) => warn!("local bridge {index}: bring-up failed: {e}"),
            }
        }

        while let Some((id, ingress)) = queue.pop() {
            let (class, via_gcid, iface_nums) = {
                let comp = match topo.component(id) {
                    Some(c) => c,
                    None => continue,
                };
                let nums = comp
                    .ifaces
                    .iter()
                    .filter(|i| i.is_usable() && Some(i.num) != ingress)
                    .map(|i| i.num)
                    .collect::<Vec<_>>();
                (comp.class, comp.gcid, nums)
            };
            if !class_ops(class).is_expandable() {
                continue;
            }
            let Some(via) = via_gcid else { continue };

            for egress in iface_nums {
                match self.explore_link(topo, cids, id, via, egress) {
                    Ok(Some(new_id)) => {
                        discovered.push(new_id);
                        let ingress = topo
                            .component(new_id)
                            .and_then(|c| c.ifaces.iter().find_map(|i| {
                                i.peer.filter(|p| p.comp == id).map(|_| i.num)
                            }));
                        queue.push((new_id, ingress));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("{via}: iface {egress} exploration failed: {e}");
                        if let Some(comp) = topo.component_mut(id) {
                            if let Some(iface) = comp.iface_mut(egress) {
                                iface.usable = false;
                            }
                        }
                    }
                }
            }
        }

        info!("crawl complete: {} components discovered", discovered.len());
        Ok(discovered)
    }

    /// Bring up and insert the component reachable at `addr`.
    fn bring_up_at(
        &mut self,
        topo: &mut Topology,
        cids: &mut CidAllocator,
        addr: CtlAddr,
    ) -> Result<ComponentId> {
        let cid = cids.alloc()?;
        let gcid = Gcid::new(self.cfg.subnet, cid);
        match bring_up_component(self.cs, &self.cfg.link, addr, self.mgr_uuid, gcid) {
            Ok(outcome) => {
                if !outcome.claimed {
                    cids.release(cid);
                }
                Ok(topo.insert(Component {
                    id: ComponentId(0), // assigned by insert
                    class_uuid: outcome.class_uuid,
                    serial: outcome.serial,
                    fru_uuid: Uuid128::from_value(outcome.class_uuid.value() ^ 0xf0f0),
                    class: outcome.class,
                    gcid: Some(outcome.gcid),
                    cstate: CState::Up,
                    usable: true,
                    ifaces: outcome.ifaces,
                }))
            }
            Err(e) => {
                cids.release(cid);
                Err(e)
            }
        }
    }

    /// Explore one egress link of an Up component. Returns the handle of a
    /// newly discovered component, or `None` for a redundant path or a
    /// locally failed peer.
    fn explore_link(
        &mut self,
        topo: &mut Topology,
        cids: &mut CidAllocator,
        id: ComponentId,
        via: Gcid,
        egress: IfaceNum,
    ) -> Result<Option<ComponentId>> {
        let relay = CtlAddr::Relay { via, egress };

        // Identity first: a sentinel here means the peer is dead, which is
        // local to this link.
        let (class_uuid, serial, _class) = match read_identity(self.cs, relay) {
            Ok(identity) => identity,
            Err(e @ FabricError::DataIntegrity { .. }) => {
                warn!("{via}: iface {egress} peer unreadable: {e}");
                if let Some(comp) = topo.component_mut(id) {
                    if let Some(iface) = comp.iface_mut(egress) {
                        iface.usable = false;
                    }
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Our side's view of the peer interface number.
        let peer_iface = {
            let mut link = LinkCtl::new(self.cs, &self.cfg.link);
            link.peer_attrs(CtlAddr::Gcid(via), egress)?.peer_iface
        };

        if let Some(known) = topo.find_by_identity(class_uuid, serial) {
            if topo.linked(id, egress, known, peer_iface) {
                return Ok(None);
            }
            if self.confirm_redundant(topo, via, egress, known, peer_iface)? {
                info!("{via}: iface {egress} is a redundant path to {known}");
                topo.add_edge(id, egress, known, peer_iface, false);
                return Ok(None);
            }
            // Nonce mismatch: a distinct component with a cloned identity.
            warn!("{via}: iface {egress} failed nonce confirmation, treating peer as new");
        }

        match self.bring_up_at(topo, cids, relay) {
            Ok(new_id) => {
                topo.add_edge(id, egress, new_id, peer_iface, false);
                Ok(Some(new_id))
            }
            Err(
                e @ (FabricError::DataIntegrity { .. }
                | FabricError::Timeout { .. }
                | FabricError::LinkOpFailed { .. }),
            ) => {
                // Record the dead component so it is visibly unusable, and
                // keep crawling siblings.
                warn!("{via}: iface {egress} peer bring-up failed: {e}");
                let dead = topo.insert(Component {
                    id: ComponentId(0),
                    class_uuid,
                    serial,
                    fru_uuid: Uuid128::from_value(class_uuid.value() ^ 0xf0f0),
                    class: _class,
                    gcid: None,
                    cstate: CState::Down,
                    usable: false,
                    ifaces: vec![Interface::down(peer_iface)],
                });
                topo.add_edge(id, egress, dead, peer_iface, false);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Confirm a suspected redundant path by depositing a fresh nonce over
    /// the link and reading it back from the known component's interface.
    fn confirm_redundant(
        &mut self,
        topo: &Topology,
        via: Gcid,
        egress: IfaceNum,
        known: ComponentId,
        peer_iface: IfaceNum,
    ) -> Result<bool> {
        let Some(known_gcid) = topo.component(known).and_then(|c| c.gcid) else {
            return Ok(false);
        };
        let nonce: u64 = rand::random();
        let mut link = LinkCtl::new(self.cs, &self.cfg.link);
        link.nonce_exchange(CtlAddr::Gcid(via), egress, nonce)?;

        let buf = read_struct(
            self.cs,
            CtlAddr::Gcid(known_gcid),
            StructSel::interface(peer_iface),
            InterfaceStruct::BYTE_LEN,
            "nonce confirmation",
        )?;
        let seen = InterfaceStruct::decode(&buf)?.remote_nonce()?;
        Ok(seen == nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_allocator_reuses_released_ids() {
        let mut a = CidAllocator::new(3);
        assert_eq!(a.alloc().expect("alloc"), 1);
        assert_eq!(a.alloc().expect("alloc"), 2);
        a.release(1);
        assert_eq!(a.alloc().expect("alloc"), 1);
        assert_eq!(a.alloc().expect("alloc"), 3);
        assert_eq!(a.alloc(), Err(FabricError::Exhausted("component id slot")));
    }
}
