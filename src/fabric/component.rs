// CLASSIFICATION: COMMUNITY
// Filename: component.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Fabric component model and per-class bring-up hooks.

use ctlspace_codec::Uuid128;

use crate::error::Result;
use crate::fabric::interface::Interface;
use crate::hw::{write_range, ControlSpace, CtlAddr, StructSel};
use crate::lattice_types::{CompClass, ComponentId, Gcid, IfaceNum};

/// Component lifecycle state, mirroring the 3-bit hardware code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CState {
    /// Powered but unconfigured.
    Down,
    /// Reachable via directed relay only, being configured.
    Cfg,
    /// Fully configured and routable.
    Up,
    /// Low-power.
    Lp,
    /// Deep low-power.
    Dlp,
}

impl CState {
    /// Decode the raw hardware code; unknown codes read as Down.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => CState::Cfg,
            2 => CState::Up,
            3 => CState::Lp,
            4 => CState::Dlp,
            _ => CState::Down,
        }
    }

    /// Raw hardware code.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        match self {
            CState::Down => 0,
            CState::Cfg => 1,
            CState::Up => 2,
            CState::Lp => 3,
            CState::Dlp => 4,
        }
    }

    /// Whether the component may carry routed traffic in this state.
    #[must_use]
    pub fn routable(self) -> bool {
        matches!(self, CState::Up | CState::Lp)
    }
}

/// A discovered physical component.
///
/// Identity is the stable `(class_uuid, serial)` pair; the fabric address is
/// mutable and assigned during bring-up. Interfaces hold weak peer
/// references by [`ComponentId`], never owning pointers.
#[derive(Debug, Clone)]
pub struct Component {
    /// Arena handle, assigned on insertion into the topology.
    pub id: ComponentId,
    /// Stable class UUID.
    pub class_uuid: Uuid128,
    /// Stable serial number.
    pub serial: u64,
    /// FRU identifier reported in snapshots.
    pub fru_uuid: Uuid128,
    /// Component class, resolved once at discovery.
    pub class: CompClass,
    /// Fabric address, once assigned.
    pub gcid: Option<Gcid>,
    /// Lifecycle state.
    pub cstate: CState,
    /// Whether routing may traverse this component.
    pub usable: bool,
    /// Interfaces in hardware order.
    pub ifaces: Vec<Interface>,
}

impl Component {
    /// A fresh component awaiting insertion; the topology arena assigns the
    /// real handle, and bring-up fills in address and state.
    #[must_use]
    pub fn new(
        class_uuid: Uuid128,
        serial: u64,
        fru_uuid: Uuid128,
        class: CompClass,
        nifaces: IfaceNum,
    ) -> Self {
        Self {
            id: ComponentId(0),
            class_uuid,
            serial,
            fru_uuid,
            class,
            gcid: None,
            cstate: CState::Down,
            usable: false,
            ifaces: (0..nifaces).map(Interface::down).collect(),
        }
    }

    /// Usability from component state plus interface census: a component is
    /// routable only when Up-ish and at least one interface is usable.
    #[must_use]
    pub fn compute_usable(&self) -> bool {
        self.cstate.routable() && self.ifaces.iter().any(Interface::is_usable)
    }

    /// The interface with the given number, if present.
    #[must_use]
    pub fn iface(&self, num: u16) -> Option<&Interface> {
        self.ifaces.iter().find(|i| i.num == num)
    }

    /// Mutable access to the interface with the given number.
    pub fn iface_mut(&mut self, num: u16) -> Option<&mut Interface> {
        self.ifaces.iter_mut().find(|i| i.num == num)
    }
}

/// Per-class bring-up hook, resolved once at discovery time.
///
/// Classes differ only after the common sequence: switches enable their
/// forwarding plane, memory components sanity-check their page grid.
pub trait ClassOps {
    /// Class-specific step run after the common bring-up sequence.
    fn post_enable(&self, cs: &mut dyn ControlSpace, addr: CtlAddr) -> Result<()>;

    /// Whether discovery recurses through this component's interfaces.
    fn is_expandable(&self) -> bool {
        false
    }
}

struct BridgeOps;
struct SwitchOps;
struct MemoryOps;
struct AcceleratorOps;

impl ClassOps for BridgeOps {
    fn post_enable(&self, _cs: &mut dyn ControlSpace, _addr: CtlAddr) -> Result<()> {
        Ok(())
    }

    fn is_expandable(&self) -> bool {
        true
    }
}

impl ClassOps for SwitchOps {
    fn post_enable(&self, cs: &mut dyn ControlSpace, addr: CtlAddr) -> Result<()> {
        // Switch forwarding stays dark until the enable bit is set.
        write_range(cs, addr, StructSel::switch(), 4, &[0x01], "switch enable")
    }

    fn is_expandable(&self) -> bool {
        true
    }
}

impl ClassOps for MemoryOps {
    fn post_enable(&self, cs: &mut dyn ControlSpace, addr: CtlAddr) -> Result<()> {
        // Touch the page grid so a dead one fails bring-up, not first use.
        crate::hw::read_struct(
            cs,
            addr,
            StructSel::page_grid(),
            ctlspace_codec::PageGridStruct::BYTE_LEN,
            "page grid probe",
        )
        .map(|_| ())
    }
}

impl ClassOps for AcceleratorOps {
    fn post_enable(&self, _cs: &mut dyn ControlSpace, _addr: CtlAddr) -> Result<()> {
        Ok(())
    }
}

/// Resolve the bring-up hook for a class.
#[must_use]
pub fn class_ops(class: CompClass) -> &'static dyn ClassOps {
    match class {
        CompClass::Bridge => &BridgeOps,
        CompClass::Switch => &SwitchOps,
        CompClass::Memory => &MemoryOps,
        CompClass::Accelerator => &AcceleratorOps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cstate_codes_round_trip() {
        for s in [CState::Down, CState::Cfg, CState::Up, CState::Lp, CState::Dlp] {
            assert_eq!(CState::from_raw(s.to_raw()), s);
        }
        assert_eq!(CState::from_raw(7), CState::Down);
    }

    #[test]
    fn only_up_states_are_routable() {
        assert!(CState::Up.routable());
        assert!(CState::Lp.routable());
        assert!(!CState::Cfg.routable());
        assert!(!CState::Dlp.routable());
    }

    #[test]
    fn expandability_follows_class() {
        assert!(class_ops(CompClass::Switch).is_expandable());
        assert!(class_ops(CompClass::Bridge).is_expandable());
        assert!(!class_ops(CompClass::Memory).is_expandable());
    }
}
