// CLASSIFICATION: COMMUNITY
// Filename: hw/model.rs v0.9
// Author: Lukas Bower
// Date Modified: 2026-08-02

//! In-memory fabric model.
//!
//! Implements [`ControlSpace`] over synthetic components so the state
//! machines, routing engine and key allocators run against real structure
//! images without hardware. Link-control opcodes complete inline; fault
//! injection can force all-ones reads on a component or stall a link's
//! control engine. Every write is logged so tests can assert hardware write
//! ordering.

use std::collections::{HashMap, HashSet};

use ctlspace_codec::{
    CoreStruct, InterfaceStruct, PageGridStruct, PageTableCaps, StructPtr, StructType,
    SwitchStruct, Uuid128,
};
use log::debug;

use crate::config::SimComponent;
use crate::error::{FabricError, Result};
use crate::fabric::component::CState;
use crate::fabric::interface::{IState, PhyState};
use crate::fabric::link::lctl;
use crate::hw::{ControlSpace, CtlAddr, StructSel, WRITE_GRANULARITY};
use crate::lattice_types::{CompClass, Gcid, IfaceNum};

/// Destination cids a model destination table can hold rows for.
pub const MODEL_MAX_CID: usize = 64;

/// One logged hardware write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Physical component index.
    pub phys: usize,
    /// Structure written.
    pub sel: StructSel,
    /// Byte offset of the write.
    pub offset: usize,
    /// Length of the write.
    pub len: usize,
}

#[derive(Debug, Clone, Copy)]
struct ModelLink {
    peer: usize,
    peer_iface: IfaceNum,
    up: bool,
}

struct ModelComp {
    class: CompClass,
    structs: HashMap<(StructType, u16), Vec<u8>>,
    links: Vec<Option<ModelLink>>,
}

/// Synthetic fabric backing the manager in tests and simulation mode.
pub struct ModelFabric {
    comps: Vec<ModelComp>,
    by_gcid: HashMap<Gcid, usize>,
    bridges: Vec<usize>,
    write_log: Vec<WriteRecord>,
    sentinel_comps: HashSet<usize>,
    stalled_links: HashSet<(usize, IfaceNum)>,
}

impl ModelFabric {
    /// Empty fabric.
    #[must_use]
    pub fn new() -> Self {
        Self {
            comps: Vec::new(),
            by_gcid: HashMap::new(),
            bridges: Vec::new(),
            write_log: Vec::new(),
            sentinel_comps: HashSet::new(),
            stalled_links: HashSet::new(),
        }
    }

    /// Add a component of `class` with the given serial; returns its
    /// physical index. Bridges are also registered as local attach points
    /// in insertion order.
    pub fn add_component(&mut self, class: CompClass, serial: u64) -> usize {
        let phys = self.comps.len();
        let mut structs = HashMap::new();

        let mut core = CoreStruct::zeroed().expect("core image");
        let class_code: u64 = match class {
            CompClass::Bridge => 1,
            CompClass::Switch => 2,
            CompClass::Memory => 3,
            CompClass::Accelerator => 4,
        };
        let class_uuid = Uuid128::from_value(
            (0x4c46_4d00_0000_0000u128 + u128::from(class_code)) << 64 | u128::from(serial),
        );
        core.set_class_uuid(class_uuid).expect("class uuid");
        core.set_serial(serial).expect("serial");
        core.set_cap1(class_code).expect("cap1");
        core.set_comp_timeout(500).expect("timeout");
        core.set_cstate(CState::Down.to_raw()).expect("cstate");
        core.set_dest_table_ptr(StructPtr::from_raw(0x100)).expect("dt ptr");
        if class == CompClass::Switch {
            core.set_switch_ptr(StructPtr::from_raw(0x200)).expect("sw ptr");
        }
        if class == CompClass::Memory {
            core.set_page_grid_ptr(StructPtr::from_raw(0x300)).expect("pg ptr");
        }
        structs.insert((StructType::Core, 0), core.as_bytes().to_vec());

        // Destination and access tables: header unit plus packed rows.
        let dest_len =
            WRITE_GRANULARITY * (1 + MODEL_MAX_CID * crate::topo::table::ENTRIES_PER_ROW);
        structs.insert((StructType::DestTable, 0), vec![0u8; dest_len]);
        let acc_len = WRITE_GRANULARITY * (1 + MODEL_MAX_CID);
        structs.insert((StructType::AccessTable, 0), vec![0u8; acc_len]);

        if class == CompClass::Switch {
            let sw = SwitchStruct::zeroed().expect("switch image");
            structs.insert((StructType::Switch, 0), sw.as_bytes().to_vec());
        }
        if class == CompClass::Memory {
            let mut grid = PageGridStruct::zeroed().expect("grid image");
            grid.set_pte_caps(PageTableCaps::WRITE_MODE | PageTableCaps::PASID)
                .expect("caps");
            grid.set_pte_bits(128).expect("pte bits");
            grid.set_pte_count(256).expect("pte count");
            structs.insert((StructType::PageGrid, 0), grid.as_bytes().to_vec());
        }

        self.comps.push(ModelComp {
            class,
            structs,
            links: Vec::new(),
        });
        if class == CompClass::Bridge {
            self.bridges.push(phys);
        }
        phys
    }

    /// Connect interface `ai` of `a` to interface `bi` of `b`.
    pub fn link(&mut self, a: usize, ai: IfaceNum, b: usize, bi: IfaceNum) {
        self.attach(a, ai, b, bi);
        self.attach(b, bi, a, ai);
    }

    fn attach(&mut self, from: usize, iface: IfaceNum, to: usize, to_iface: IfaceNum) {
        let comp = &mut self.comps[from];
        if comp.links.len() <= iface as usize {
            comp.links.resize(iface as usize + 1, None);
        }
        comp.links[iface as usize] = Some(ModelLink {
            peer: to,
            peer_iface: to_iface,
            up: true,
        });

        let mut ist = InterfaceStruct::zeroed().expect("iface image");
        ist.set_phy_state(PhyState::Up.to_raw()).expect("phy");
        ist.set_istate(IState::Down.to_raw()).expect("istate");
        comp.structs
            .insert((StructType::Interface, iface), ist.as_bytes().to_vec());

        let count = comp.links.len() as u64;
        let mut core = CoreStruct::decode(&comp.structs[&(StructType::Core, 0)]).expect("core");
        core.set_iface_count(count).expect("iface count");
        if core.iface_ptr().expect("iface ptr").is_null() {
            core.set_iface_ptr(StructPtr::from_raw(0x80)).expect("iface ptr");
        }
        comp.structs
            .insert((StructType::Core, 0), core.as_bytes().to_vec());
    }

    /// Build a fabric from the config's topology stanza.
    pub fn from_config(topology: &[SimComponent]) -> Result<Self> {
        let mut fabric = Self::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (i, sim) in topology.iter().enumerate() {
            let class: CompClass = sim
                .class
                .parse()
                .map_err(FabricError::Config)?;
            let phys = fabric.add_component(class, 0x1000 + i as u64);
            by_name.insert(sim.name.as_str(), phys);
        }
        for sim in topology {
            let a = by_name[sim.name.as_str()];
            for link in &sim.links {
                let mut parts = link.splitn(3, ':');
                let (ai, peer, bi) = match (parts.next(), parts.next(), parts.next()) {
                    (Some(ai), Some(peer), Some(bi)) => (ai, peer, bi),
                    _ => {
                        return Err(FabricError::Config(format!(
                            "bad link spec {link:?} on {}",
                            sim.name
                        )))
                    }
                };
                let ai: IfaceNum = ai
                    .parse()
                    .map_err(|_| FabricError::Config(format!("bad iface in {link:?}")))?;
                let bi: IfaceNum = bi
                    .parse()
                    .map_err(|_| FabricError::Config(format!("bad iface in {link:?}")))?;
                let b = *by_name.get(peer).ok_or_else(|| {
                    FabricError::Config(format!("unknown peer {peer:?} in {link:?}"))
                })?;
                // Links appear once per pair in config; skip the mirror.
                if fabric.comps[a]
                    .links
                    .get(ai as usize)
                    .copied()
                    .flatten()
                    .is_none()
                {
                    fabric.link(a, ai, b, bi);
                }
            }
        }
        Ok(fabric)
    }

    /// Number of locally attached bridges.
    #[must_use]
    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    /// Force all subsequent reads of `phys` to return the all-ones sentinel.
    pub fn force_sentinel(&mut self, phys: usize) {
        self.sentinel_comps.insert(phys);
    }

    /// Stall the link-control engine on `(phys, iface)`: operations stay
    /// busy until the caller's deadline expires.
    pub fn stall_link(&mut self, phys: usize, iface: IfaceNum) {
        self.stalled_links.insert((phys, iface));
    }

    /// Drop the link attached at `(phys, iface)` on both ends.
    pub fn fail_link(&mut self, phys: usize, iface: IfaceNum) {
        let Some(Some(link)) = self.comps[phys].links.get(iface as usize).copied() else {
            return;
        };
        self.drop_end(phys, iface);
        self.drop_end(link.peer, link.peer_iface);
    }

    fn drop_end(&mut self, phys: usize, iface: IfaceNum) {
        if let Some(slot) = self.comps[phys].links.get_mut(iface as usize) {
            if let Some(l) = slot.as_mut() {
                l.up = false;
            }
        }
        if let Some(buf) = self.comps[phys]
            .structs
            .get_mut(&(StructType::Interface, iface))
        {
            if let Ok(mut ist) = InterfaceStruct::decode(buf) {
                ist.set_phy_state(PhyState::Down.to_raw()).ok();
                ist.set_istate(IState::Down.to_raw()).ok();
                ist.set_sticky(0x1).ok();
                *buf = ist.as_bytes().to_vec();
            }
        }
    }

    /// The write log in issue order.
    #[must_use]
    pub fn write_log(&self) -> &[WriteRecord] {
        &self.write_log
    }

    /// Forget logged writes.
    pub fn clear_write_log(&mut self) {
        self.write_log.clear();
    }

    /// Physical index behind a fabric address, if programmed.
    #[must_use]
    pub fn phys_of(&self, gcid: Gcid) -> Option<usize> {
        self.by_gcid.get(&gcid).copied()
    }

    fn resolve(&self, addr: CtlAddr) -> Result<usize> {
        match addr {
            CtlAddr::Gcid(g) => self
                .by_gcid
                .get(&g)
                .copied()
                .ok_or(FabricError::UnknownAddress(g)),
            CtlAddr::Relay { via, egress } => {
                let phys = self
                    .by_gcid
                    .get(&via)
                    .copied()
                    .ok_or(FabricError::UnknownAddress(via))?;
                self.comps[phys]
                    .links
                    .get(egress as usize)
                    .copied()
                    .flatten()
                    .filter(|l| l.up)
                    .map(|l| l.peer)
                    .ok_or(FabricError::UnknownAddress(via))
            }
            CtlAddr::Local { index } => self
                .bridges
                .get(index)
                .copied()
                .ok_or(FabricError::UnknownAddress(Gcid::new(0, index as u16))),
        }
    }

    /// Run post-write hardware behavior for the touched structure.
    fn post_write(&mut self, phys: usize, sel: StructSel) {
        match sel.ty {
            StructType::Core => self.core_effects(phys),
            StructType::Interface => {
                self.lctl_effects(phys, sel.index);
                self.ienable_effects(phys, sel.index);
            }
            _ => {}
        }
    }

    fn core_effects(&mut self, phys: usize) {
        let Some(buf) = self.comps[phys].structs.get(&(StructType::Core, 0)) else {
            return;
        };
        let Ok(mut core) = CoreStruct::decode(buf) else {
            return;
        };
        let cid = core.cid().unwrap_or(0) as u16;
        if cid != 0 {
            let gcid = Gcid::new(core.sid().unwrap_or(0) as u16, cid);
            self.by_gcid.retain(|_, p| *p != phys);
            self.by_gcid.insert(gcid, phys);
        }
        let mut dirty = false;
        let cstate = CState::from_raw(core.cstate().unwrap_or(0));
        if core.comp_enb().unwrap_or(0) == 1 && cstate != CState::Up {
            core.set_cstate(CState::Up.to_raw()).ok();
            dirty = true;
        } else if core.comp_enb().unwrap_or(0) == 0
            && !core.mgr_uuid().map(Uuid128::is_nil).unwrap_or(true)
            && cstate == CState::Down
        {
            core.set_cstate(CState::Cfg.to_raw()).ok();
            dirty = true;
        }
        if dirty {
            self.comps[phys]
                .structs
                .insert((StructType::Core, 0), core.as_bytes().to_vec());
        }
    }

    fn ienable_effects(&mut self, phys: usize, iface: u16) {
        let Some(buf) = self.comps[phys]
            .structs
            .get(&(StructType::Interface, iface))
        else {
            return;
        };
        let Ok(mut ist) = InterfaceStruct::decode(buf) else {
            return;
        };
        let phy = PhyState::from_raw(ist.phy_state().unwrap_or(0));
        let enabled = ist.ienable().unwrap_or(0) == 1;
        let want = if enabled && phy.is_up() {
            IState::Up
        } else {
            IState::Down
        };
        if IState::from_raw(ist.istate().unwrap_or(0)) != want {
            ist.set_istate(want.to_raw()).ok();
            self.comps[phys]
                .structs
                .insert((StructType::Interface, iface), ist.as_bytes().to_vec());
        }
    }

    fn lctl_effects(&mut self, phys: usize, iface: u16) {
        let Some(buf) = self.comps[phys]
            .structs
            .get(&(StructType::Interface, iface))
        else {
            return;
        };
        let Ok(mut ist) = InterfaceStruct::decode(buf) else {
            return;
        };
        let op = ist.lctl_op().unwrap_or(0);
        if op == lctl::OP_NONE || ist.lctl_status().unwrap_or(0) != lctl::ST_IDLE {
            return;
        }
        if self.stalled_links.contains(&(phys, iface)) {
            ist.set_lctl_status(lctl::ST_BUSY).ok();
            self.comps[phys]
                .structs
                .insert((StructType::Interface, iface), ist.as_bytes().to_vec());
            return;
        }
        let link = self.comps[phys].links.get(iface as usize).copied().flatten();
        let status = match (op, link) {
            (_, None) => lctl::ST_FAILED,
            (_, Some(l)) if !l.up => lctl::ST_FAILED,
            (lctl::OP_PEER_ATTR, Some(l)) => {
                let peer_core = self.comps[l.peer]
                    .structs
                    .get(&(StructType::Core, 0))
                    .and_then(|b| CoreStruct::decode(b).ok());
                let (cid, sid) = peer_core
                    .map(|c| (c.cid().unwrap_or(0), c.sid().unwrap_or(0)))
                    .unwrap_or((0, 0));
                ist.set_peer_cid(cid).ok();
                ist.set_peer_sid(sid).ok();
                ist.set_peer_iface(u64::from(l.peer_iface)).ok();
                ist.set_peer_valid(1).ok();
                lctl::ST_DONE
            }
            (lctl::OP_PATH_TIME, Some(_)) => {
                ist.set_path_time(10 + phys as u64).ok();
                lctl::ST_DONE
            }
            (lctl::OP_NONCE, Some(l)) => {
                let nonce = ist.nonce().unwrap_or(0);
                debug!("model: nonce {nonce:#x} {phys}.{iface} -> {}.{}", l.peer, l.peer_iface);
                if let Some(peer_buf) = self.comps[l.peer]
                    .structs
                    .get_mut(&(StructType::Interface, l.peer_iface))
                {
                    if let Ok(mut peer) = InterfaceStruct::decode(peer_buf) {
                        peer.set_remote_nonce(nonce).ok();
                        *peer_buf = peer.as_bytes().to_vec();
                    }
                }
                lctl::ST_DONE
            }
            _ => lctl::ST_FAILED,
        };
        ist.set_lctl_status(status).ok();
        self.comps[phys]
            .structs
            .insert((StructType::Interface, iface), ist.as_bytes().to_vec());
    }
}

impl Default for ModelFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSpace for ModelFabric {
    fn read(
        &mut self,
        addr: CtlAddr,
        sel: StructSel,
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>> {
        debug_assert_eq!(offset % WRITE_GRANULARITY, 0);
        debug_assert_eq!(len % WRITE_GRANULARITY, 0);
        let phys = self.resolve(addr)?;
        if self.sentinel_comps.contains(&phys) {
            return Ok(vec![0xff; len]);
        }
        // Unmapped control space reads as all-ones, like real hardware.
        let mut out = vec![0xff; len];
        if let Some(buf) = self.comps[phys].structs.get(&(sel.ty, sel.index)) {
            let end = buf.len().min(offset + len);
            if end > offset {
                out[..end - offset].copy_from_slice(&buf[offset..end]);
            }
        }
        Ok(out)
    }

    fn write(&mut self, addr: CtlAddr, sel: StructSel, offset: usize, data: &[u8]) -> Result<()> {
        debug_assert_eq!(offset % WRITE_GRANULARITY, 0);
        debug_assert_eq!(data.len() % WRITE_GRANULARITY, 0);
        let phys = self.resolve(addr)?;
        self.write_log.push(WriteRecord {
            phys,
            sel,
            offset,
            len: data.len(),
        });
        if self.sentinel_comps.contains(&phys) {
            // Writes to a failed component vanish; read-back verification
            // sees the sentinel.
            return Ok(());
        }
        let buf = self.comps[phys]
            .structs
            .entry((sel.ty, sel.index))
            .or_insert_with(Vec::new);
        if buf.len() < offset + data.len() {
            buf.resize(offset + data.len(), 0);
        }
        buf[offset..offset + data.len()].copy_from_slice(data);
        self.post_write(phys, sel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::read_range;

    fn linked_pair() -> ModelFabric {
        let mut f = ModelFabric::new();
        let br = f.add_component(CompClass::Bridge, 1);
        let sw = f.add_component(CompClass::Switch, 2);
        f.link(br, 0, sw, 1);
        f
    }

    #[test]
    fn local_bridge_is_addressable_without_gcid() {
        let mut f = linked_pair();
        let buf = f
            .read(CtlAddr::Local { index: 0 }, StructSel::core(), 0, 256)
            .expect("read core");
        let core = CoreStruct::decode(&buf).expect("decode");
        assert_eq!(core.serial().expect("serial"), 1);
    }

    #[test]
    fn peer_attr_op_completes_inline() {
        let mut f = linked_pair();
        let addr = CtlAddr::Local { index: 0 };
        f.write(addr, StructSel::interface(0), 16, &[0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0])
            .expect("issue op");
        let buf = read_range(&mut f, addr, StructSel::interface(0), 24, 1).expect("status");
        let full = f
            .read(addr, StructSel::interface(0), 0, InterfaceStruct::BYTE_LEN)
            .expect("iface");
        let ist = InterfaceStruct::decode(&full).expect("decode");
        assert_eq!(ist.lctl_status().expect("status"), lctl::ST_DONE);
        assert_eq!(ist.peer_iface().expect("peer iface"), 1);
        let _ = buf;
    }

    #[test]
    fn sentinel_comp_reads_all_ones() {
        let mut f = linked_pair();
        f.force_sentinel(1);
        // Reach the switch by relay once the bridge has an address.
        let addr = CtlAddr::Local { index: 0 };
        let mut core_buf = f.read(addr, StructSel::core(), 0, 256).expect("core");
        let mut core = CoreStruct::decode(&core_buf).expect("decode");
        core.set_cid(5).expect("cid");
        core_buf = core.as_bytes().to_vec();
        f.write(addr, StructSel::core(), 0, &core_buf).expect("program");
        let relay = CtlAddr::Relay {
            via: Gcid::new(0, 5),
            egress: 0,
        };
        let peer = f.read(relay, StructSel::core(), 0, 64).expect("relay read");
        assert!(ctlspace_codec::is_sentinel(&peer));
    }

    #[test]
    fn failed_link_reports_failed_ops() {
        let mut f = linked_pair();
        f.fail_link(0, 0);
        let addr = CtlAddr::Local { index: 0 };
        let mut unit = vec![0u8; 16];
        unit[8] = lctl::OP_PEER_ATTR as u8;
        f.write(addr, StructSel::interface(0), 16, &unit).expect("issue");
        let full = f
            .read(addr, StructSel::interface(0), 0, InterfaceStruct::BYTE_LEN)
            .expect("iface");
        let ist = InterfaceStruct::decode(&full).expect("decode");
        assert_eq!(ist.lctl_status().expect("status"), lctl::ST_FAILED);
    }
}
