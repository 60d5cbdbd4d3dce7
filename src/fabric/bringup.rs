// CLASSIFICATION: COMMUNITY
// Filename: bringup.rs v0.8
// Author: Lukas Bower
// Date Modified: 2026-07-28

//! Component and interface bring-up sequences.
//!
//! The component order is fixed: read identity, capture link states, claim
//! ownership, program addressing only if not already owned, enable
//! forwarding, verify the configuration-timeout window stuck, then set the
//! enable bit. Any all-ones read is fatal to that bring-up; the component is
//! marked unusable by the caller instead of retried in place.

use ctlspace_codec::{CoreStruct, InterfaceStruct, Uuid128};
use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{FabricError, Result};
use crate::fabric::component::{class_ops, CState};
use crate::fabric::interface::{IState, Interface, PhyState};
use crate::fabric::link::LinkCtl;
use crate::hw::{
    read_range, read_struct, write_range, write_verified, ControlSpace, CtlAddr, StructSel,
};
use crate::lattice_types::{CompClass, Gcid, IfaceNum};

/// Byte offsets into the core structure used by the bring-up writes.
mod core_off {
    /// Byte holding cstate (bits 0..3), comp_enb (bit 3), fwd_enb (bit 4).
    pub const STATE: usize = 36;
    /// Component id (12 bits) then subnet id, four bytes total.
    pub const GCID: usize = 40;
    /// Manager UUID `{low, high}` halves, sixteen bytes.
    pub const MGR_UUID: usize = 48;
}

const COMP_ENB_BIT: u8 = 0x08;
const FWD_ENB_BIT: u8 = 0x10;

/// Result of a successful component bring-up.
#[derive(Debug)]
pub struct BringUpOutcome {
    /// Stable class UUID.
    pub class_uuid: Uuid128,
    /// Stable serial number.
    pub serial: u64,
    /// Class resolved from the capability word.
    pub class: CompClass,
    /// Address the component answers to from now on.
    pub gcid: Gcid,
    /// Whether this manager claimed ownership (false: a prior owner's
    /// addressing was kept).
    pub claimed: bool,
    /// Interface census after interface bring-up.
    pub ifaces: Vec<Interface>,
}

/// Read only the identity fields of a component's core structure.
///
/// Used by discovery to recognize already-known components before running
/// the full sequence.
pub fn read_identity(
    cs: &mut dyn ControlSpace,
    addr: CtlAddr,
) -> Result<(Uuid128, u64, CompClass)> {
    let buf = read_struct(cs, addr, StructSel::core(), CoreStruct::BYTE_LEN, "identity read")?;
    let core = CoreStruct::decode(&buf)?;
    let class = CompClass::from_code(core.cap1()? & 0xf).unwrap_or_else(|| {
        warn!("{}: unknown class code, treating as accelerator", addr.report_gcid());
        CompClass::Accelerator
    });
    Ok((core.class_uuid()?, core.serial()?, class))
}

/// Run the full component bring-up sequence at `addr`, proposing `gcid` as
/// its fabric address.
pub fn bring_up_component(
    cs: &mut dyn ControlSpace,
    link_cfg: &LinkConfig,
    addr: CtlAddr,
    mgr_uuid: Uuid128,
    gcid: Gcid,
) -> Result<BringUpOutcome> {
    let buf = read_struct(cs, addr, StructSel::core(), CoreStruct::BYTE_LEN, "component bring-up")?;
    let core = CoreStruct::decode(&buf)?;
    let class_uuid = core.class_uuid()?;
    let serial = core.serial()?;
    let class = CompClass::from_code(core.cap1()? & 0xf).unwrap_or(CompClass::Accelerator);
    let iface_count = core.iface_count()? as u16;

    // Capture current link states before touching anything.
    let mut ifaces = Vec::with_capacity(iface_count as usize);
    for num in 0..iface_count {
        ifaces.push(capture_iface(cs, addr, num)?);
    }

    // Conditionally claim ownership.
    let owner = core.mgr_uuid()?;
    let claimed = if owner.is_nil() {
        let mut id_bytes = [0u8; 16];
        id_bytes[..8].copy_from_slice(&mgr_uuid.low().to_le_bytes());
        id_bytes[8..].copy_from_slice(&mgr_uuid.high().to_le_bytes());
        write_verified(cs, addr, StructSel::core(), core_off::MGR_UUID, &id_bytes, "ownership claim")?;
        true
    } else if owner == mgr_uuid {
        true
    } else {
        info!("{}: owned by {owner}, keeping its addressing", addr.report_gcid());
        false
    };

    // Program addressing only if not already owned by someone else.
    let assigned = if claimed {
        let mut gcid_bytes = [0u8; 4];
        gcid_bytes[0] = (gcid.cid & 0xff) as u8;
        gcid_bytes[1] = (gcid.cid >> 8) as u8 & 0x0f;
        gcid_bytes[2..4].copy_from_slice(&gcid.sid.to_le_bytes());
        write_verified(cs, addr, StructSel::core(), core_off::GCID, &gcid_bytes, "address programming")?;
        gcid
    } else {
        let cid = core.cid()? as u16;
        if cid == 0 {
            return Err(FabricError::Conflict {
                what: "component ownership",
                value: owner.low(),
            });
        }
        Gcid::new(core.sid()? as u16, cid)
    };

    // From here the component answers on its fabric address.
    let addr = CtlAddr::Gcid(assigned);

    // Enable forwarding.
    let state = read_range(cs, addr, StructSel::core(), core_off::STATE, 1)?[0];
    write_range(cs, addr, StructSel::core(), core_off::STATE, &[state | FWD_ENB_BIT], "forwarding enable")?;

    // Verify the configuration-timeout window has not elapsed: the address
    // we wrote must still be sticking.
    let back = read_range(cs, addr, StructSel::core(), core_off::GCID, 4)?;
    let cid_back = u16::from(back[0]) | (u16::from(back[1] & 0x0f) << 8);
    if cid_back != assigned.cid {
        return Err(FabricError::Timeout {
            what: "configuration window",
            millis: u64::from(CoreStruct::decode(&buf)?.comp_timeout()? as u32),
        });
    }

    // Set the enable bit; the component leaves C-CFG.
    let state = read_range(cs, addr, StructSel::core(), core_off::STATE, 1)?[0];
    write_range(cs, addr, StructSel::core(), core_off::STATE, &[state | COMP_ENB_BIT | FWD_ENB_BIT], "component enable")?;
    let buf = read_struct(cs, addr, StructSel::core(), CoreStruct::BYTE_LEN, "component enable")?;
    let cstate = CState::from_raw(CoreStruct::decode(&buf)?.cstate()?);
    if cstate != CState::Up {
        return Err(FabricError::Timeout {
            what: "component enable",
            millis: link_cfg.timeout_ms,
        });
    }

    class_ops(class).post_enable(cs, addr)?;

    // Bring interfaces up now the component is routable. Failures stay
    // local to the interface.
    for iface in &mut ifaces {
        match bring_up_interface(cs, link_cfg, addr, iface.num) {
            Ok(brought) => *iface = brought,
            Err(e) => {
                warn!("{assigned}: iface {} bring-up failed: {e}", iface.num);
                iface.mark_down();
            }
        }
    }

    info!("{assigned}: {class} serial {serial:#x} is C-Up ({} ifaces)", ifaces.len());
    Ok(BringUpOutcome {
        class_uuid,
        serial,
        class,
        gcid: assigned,
        claimed,
        ifaces,
    })
}

/// Capture an interface's current state without configuring it.
fn capture_iface(cs: &mut dyn ControlSpace, addr: CtlAddr, num: IfaceNum) -> Result<Interface> {
    let buf = read_struct(
        cs,
        addr,
        StructSel::interface(num),
        InterfaceStruct::BYTE_LEN,
        "link-state capture",
    )?;
    let ist = InterfaceStruct::decode(&buf)?;
    let mut iface = Interface::down(num);
    iface.istate = IState::from_raw(ist.istate()?);
    iface.phy = PhyState::from_raw(ist.phy_state()?);
    Ok(iface)
}

/// Bring one interface from I-Down through I-CFG to I-Up.
///
/// Sticky status bits are cleared last, after all other configuration, so a
/// peer's notification of our own enable is not raced away.
pub fn bring_up_interface(
    cs: &mut dyn ControlSpace,
    link_cfg: &LinkConfig,
    addr: CtlAddr,
    num: IfaceNum,
) -> Result<Interface> {
    let mut iface = capture_iface(cs, addr, num)?;
    if !iface.phy.is_up() {
        debug!("{}: iface {num} PHY down, leaving I-Down", addr.report_gcid());
        return Ok(iface);
    }

    let mut link = LinkCtl::new(cs, link_cfg);
    let attrs = link.peer_attrs(addr, num)?;
    let path_time = link.path_time(addr, num)?;
    let nonce: u64 = rand::random();
    link.nonce_exchange(addr, num, nonce)?;

    // Enable only now that the PHY is confirmed Up (or Up-LP).
    let cur = read_range(cs, addr, StructSel::interface(num), 4, 1)?[0];
    write_range(cs, addr, StructSel::interface(num), 4, &[cur | 0x40], "interface enable")?;

    let buf = read_struct(
        cs,
        addr,
        StructSel::interface(num),
        InterfaceStruct::BYTE_LEN,
        "interface enable",
    )?;
    let ist = InterfaceStruct::decode(&buf)?;
    iface.istate = IState::from_raw(ist.istate()?);
    iface.phy = PhyState::from_raw(ist.phy_state()?);
    iface.usable = matches!(iface.istate, IState::Up | IState::Lp);
    iface.path_time = Some(path_time);

    // Sticky clear comes last.
    write_range(cs, addr, StructSel::interface(num), 40, &[0u8; 4], "sticky clear")?;

    debug!(
        "{}: iface {num} up, peer iface {} path-time {path_time}",
        addr.report_gcid(),
        attrs.peer_iface
    );
    Ok(iface)
}
