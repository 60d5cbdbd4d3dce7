// CLASSIFICATION: COMMUNITY
// Filename: hw/mod.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-07-20

//! Control-space access layer.
//!
//! Every hardware interaction goes through the [`ControlSpace`] trait as a
//! `(component, structure, byte-offset, length)` read or write. The helpers
//! here enforce the hardware's minimum write granularity and re-validate
//! data after writes whose correctness the caller depends on.

use ctlspace_codec::{is_sentinel, StructType};

use crate::error::{FabricError, Result};
use crate::lattice_types::{Gcid, IfaceNum};

pub mod model;

pub use model::ModelFabric;

/// Minimum aligned unit the hardware accepts for reads and writes.
pub const WRITE_GRANULARITY: usize = 16;

/// Selects one structure instance within a component's control space.
///
/// `index` distinguishes per-interface structures and table instances;
/// singleton structures use index zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructSel {
    /// Structure type.
    pub ty: StructType,
    /// Instance index.
    pub index: u16,
}

impl StructSel {
    /// The component core structure.
    #[must_use]
    pub fn core() -> Self {
        Self {
            ty: StructType::Core,
            index: 0,
        }
    }

    /// The interface structure for interface `num`.
    #[must_use]
    pub fn interface(num: IfaceNum) -> Self {
        Self {
            ty: StructType::Interface,
            index: num,
        }
    }

    /// The switch structure.
    #[must_use]
    pub fn switch() -> Self {
        Self {
            ty: StructType::Switch,
            index: 0,
        }
    }

    /// The destination table.
    #[must_use]
    pub fn dest_table() -> Self {
        Self {
            ty: StructType::DestTable,
            index: 0,
        }
    }

    /// The access-control table.
    #[must_use]
    pub fn access_table() -> Self {
        Self {
            ty: StructType::AccessTable,
            index: 0,
        }
    }

    /// The page grid.
    #[must_use]
    pub fn page_grid() -> Self {
        Self {
            ty: StructType::PageGrid,
            index: 0,
        }
    }
}

/// How a control-space request reaches its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlAddr {
    /// A component with a programmed fabric address.
    Gcid(Gcid),
    /// Directed relay through an already-Up component's egress interface,
    /// used to reach a component before it has a permanent address.
    Relay {
        /// The Up component relaying the request.
        via: Gcid,
        /// Egress interface on the relaying component.
        egress: IfaceNum,
    },
    /// A locally attached bridge, addressable before any address exists.
    Local {
        /// Local bridge index.
        index: usize,
    },
}

impl CtlAddr {
    /// Best-effort address for error reports; relays report the relaying
    /// component.
    #[must_use]
    pub fn report_gcid(&self) -> Gcid {
        match self {
            CtlAddr::Gcid(g) => *g,
            CtlAddr::Relay { via, .. } => *via,
            CtlAddr::Local { index } => Gcid::new(0, *index as u16),
        }
    }
}

/// Raw control-space access. Implementations resolve addressing and move
/// bytes; sizing and verification live in the helpers below.
pub trait ControlSpace {
    /// Read `len` bytes at `offset` within a structure. `offset` and `len`
    /// must be multiples of [`WRITE_GRANULARITY`].
    fn read(&mut self, addr: CtlAddr, sel: StructSel, offset: usize, len: usize)
        -> Result<Vec<u8>>;

    /// Write bytes at `offset` within a structure. `offset` and the data
    /// length must be multiples of [`WRITE_GRANULARITY`].
    fn write(&mut self, addr: CtlAddr, sel: StructSel, offset: usize, data: &[u8]) -> Result<()>;
}

fn align_down(v: usize) -> usize {
    v / WRITE_GRANULARITY * WRITE_GRANULARITY
}

fn align_up(v: usize) -> usize {
    v.div_ceil(WRITE_GRANULARITY) * WRITE_GRANULARITY
}

/// Read an arbitrary byte range, widening to aligned units.
pub fn read_range(
    cs: &mut dyn ControlSpace,
    addr: CtlAddr,
    sel: StructSel,
    offset: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let start = align_down(offset);
    let end = align_up(offset + len);
    let raw = cs.read(addr, sel, start, end - start)?;
    Ok(raw[offset - start..offset - start + len].to_vec())
}

/// Write an arbitrary byte range via read-modify-write of aligned units.
///
/// The surrounding read is sentinel-checked: merging caller bytes into an
/// all-ones unit would mask a dead component.
pub fn write_range(
    cs: &mut dyn ControlSpace,
    addr: CtlAddr,
    sel: StructSel,
    offset: usize,
    data: &[u8],
    during: &'static str,
) -> Result<()> {
    let start = align_down(offset);
    let end = align_up(offset + data.len());
    let mut unit = cs.read(addr, sel, start, end - start)?;
    if is_sentinel(&unit) {
        return Err(FabricError::DataIntegrity {
            gcid: addr.report_gcid(),
            during,
        });
    }
    unit[offset - start..offset - start + data.len()].copy_from_slice(data);
    cs.write(addr, sel, start, &unit)
}

/// Write then re-read, failing if a concurrent bus error introduced the
/// all-ones sentinel or the value did not stick.
pub fn write_verified(
    cs: &mut dyn ControlSpace,
    addr: CtlAddr,
    sel: StructSel,
    offset: usize,
    data: &[u8],
    during: &'static str,
) -> Result<()> {
    write_range(cs, addr, sel, offset, data, during)?;
    let back = read_range(cs, addr, sel, offset, data.len())?;
    if is_sentinel(&back) || back != data {
        return Err(FabricError::DataIntegrity {
            gcid: addr.report_gcid(),
            during,
        });
    }
    Ok(())
}

/// Read a whole structure, sentinel-checked.
pub fn read_struct(
    cs: &mut dyn ControlSpace,
    addr: CtlAddr,
    sel: StructSel,
    len: usize,
    during: &'static str,
) -> Result<Vec<u8>> {
    let buf = cs.read(addr, sel, 0, align_up(len))?;
    if is_sentinel(&buf) {
        return Err(FabricError::DataIntegrity {
            gcid: addr.report_gcid(),
            during,
        });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_align_to_write_granularity() {
        assert_eq!(align_down(17), 16);
        assert_eq!(align_up(17), 32);
        assert_eq!(align_up(32), 32);
    }
}
