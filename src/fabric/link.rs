// CLASSIFICATION: COMMUNITY
// Filename: link.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-08-23

//! Link-control operations.
//!
//! Every operation is the same request/poll shape: write the opcode, poll
//! the status register at a fixed interval until it reports done or failed,
//! give up at the hard deadline. A timeout is terminal for the interface;
//! nothing here retries.

use std::thread;
use std::time::{Duration, Instant};

use ctlspace_codec::InterfaceStruct;
use log::{debug, warn};

use crate::config::LinkConfig;
use crate::error::{FabricError, Result};
use crate::hw::{read_struct, write_range, ControlSpace, CtlAddr, StructSel};
use crate::lattice_types::{Gcid, IfaceNum};

/// Link-control opcodes.
pub mod lctl {
    /// No operation pending.
    pub const OP_NONE: u64 = 0;
    /// Exchange peer attributes (address, interface number).
    pub const OP_PEER_ATTR: u64 = 1;
    /// Measure the path time across the link.
    pub const OP_PATH_TIME: u64 = 2;
    /// Deposit this interface's nonce on the peer.
    pub const OP_NONCE: u64 = 3;

    /// Status: idle, no operation in flight.
    pub const ST_IDLE: u64 = 0;
    /// Status: operation in flight.
    pub const ST_BUSY: u64 = 1;
    /// Status: operation completed.
    pub const ST_DONE: u64 = 2;
    /// Status: operation failed.
    pub const ST_FAILED: u64 = 3;
}

/// Peer attributes returned by [`LinkCtl::peer_attrs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAttrs {
    /// Peer fabric address, if the peer already has one.
    pub peer_gcid: Option<Gcid>,
    /// Interface number on the peer side of the link.
    pub peer_iface: IfaceNum,
}

/// Poll-driven link-control engine over one control space.
pub struct LinkCtl<'a> {
    cs: &'a mut dyn ControlSpace,
    cfg: &'a LinkConfig,
}

impl<'a> LinkCtl<'a> {
    /// Borrow a control space and polling parameters.
    pub fn new(cs: &'a mut dyn ControlSpace, cfg: &'a LinkConfig) -> Self {
        Self { cs, cfg }
    }

    /// Run the peer-attribute exchange on `iface`.
    pub fn peer_attrs(&mut self, addr: CtlAddr, iface: IfaceNum) -> Result<PeerAttrs> {
        let st = self.run_op(addr, iface, lctl::OP_PEER_ATTR, "peer-attribute exchange")?;
        if st.peer_valid()? != 1 {
            warn!("{}: iface {iface} peer attributes invalid", addr.report_gcid());
            return Err(FabricError::LinkOpFailed {
                what: "peer-attribute exchange",
                gcid: addr.report_gcid(),
            });
        }
        let cid = st.peer_cid()? as u16;
        let peer_gcid = if cid == 0 {
            None
        } else {
            Some(Gcid::new(st.peer_sid()? as u16, cid))
        };
        Ok(PeerAttrs {
            peer_gcid,
            peer_iface: st.peer_iface()? as u16,
        })
    }

    /// Run the path-time exchange on `iface`.
    pub fn path_time(&mut self, addr: CtlAddr, iface: IfaceNum) -> Result<u32> {
        let st = self.run_op(addr, iface, lctl::OP_PATH_TIME, "path-time exchange")?;
        Ok(st.path_time()? as u32)
    }

    /// Write `nonce` into the interface and run the nonce exchange, leaving
    /// the value in the peer interface's remote-nonce register.
    pub fn nonce_exchange(&mut self, addr: CtlAddr, iface: IfaceNum, nonce: u64) -> Result<()> {
        write_range(
            self.cs,
            addr,
            StructSel::interface(iface),
            16,
            &nonce.to_le_bytes(),
            "nonce exchange",
        )?;
        self.run_op(addr, iface, lctl::OP_NONCE, "nonce exchange")?;
        Ok(())
    }

    /// Issue an opcode and poll to completion, returning the final
    /// interface image.
    fn run_op(
        &mut self,
        addr: CtlAddr,
        iface: IfaceNum,
        op: u64,
        what: &'static str,
    ) -> Result<InterfaceStruct> {
        let sel = StructSel::interface(iface);
        debug!("{}: iface {iface} {what}", addr.report_gcid());
        // Opcode and status share the byte at offset 24.
        write_range(self.cs, addr, sel, 24, &[op as u8], what)?;
        let deadline = Instant::now() + Duration::from_millis(self.cfg.timeout_ms);
        loop {
            let buf = read_struct(self.cs, addr, sel, InterfaceStruct::BYTE_LEN, what)?;
            let st = InterfaceStruct::decode(&buf)?;
            match st.lctl_status()? {
                lctl::ST_DONE => {
                    // Clear the opcode/status byte for the next operation.
                    write_range(self.cs, addr, sel, 24, &[0u8], what)?;
                    return Ok(st);
                }
                lctl::ST_FAILED => {
                    return Err(FabricError::LinkOpFailed {
                        what,
                        gcid: addr.report_gcid(),
                    })
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(FabricError::Timeout {
                    what,
                    millis: self.cfg.timeout_ms,
                });
            }
            thread::sleep(Duration::from_millis(self.cfg.poll_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::model::ModelFabric;
    use crate::lattice_types::CompClass;

    fn rig() -> ModelFabric {
        let mut model = ModelFabric::new();
        let br = model.add_component(CompClass::Bridge, 1);
        let sw = model.add_component(CompClass::Switch, 2);
        model.link(br, 0, sw, 1);
        model
    }

    fn fast_cfg() -> LinkConfig {
        LinkConfig {
            poll_ms: 1,
            timeout_ms: 10,
        }
    }

    #[test]
    fn dead_link_reports_failure_not_timeout() {
        let mut model = rig();
        model.fail_link(0, 0);
        let cfg = fast_cfg();
        let mut link = LinkCtl::new(&mut model, &cfg);
        let err = link
            .peer_attrs(CtlAddr::Local { index: 0 }, 0)
            .expect_err("dead link");
        assert!(matches!(err, FabricError::LinkOpFailed { .. }));
    }

    #[test]
    fn stalled_link_times_out() {
        let mut model = rig();
        model.stall_link(0, 0);
        let cfg = fast_cfg();
        let mut link = LinkCtl::new(&mut model, &cfg);
        let err = link
            .path_time(CtlAddr::Local { index: 0 }, 0)
            .expect_err("stalled link");
        assert_eq!(
            err,
            FabricError::Timeout {
                what: "path-time exchange",
                millis: cfg.timeout_ms,
            }
        );
    }
}
