// Author: Lukas Bower
// Purpose: Typed views over the fixed-layout control structures.

//! Fixed-layout control structures.
//!
//! Each view wraps the raw structure bytes; accessors address named fields at
//! their hardware bit positions and mutations write back into the same
//! buffer, so an unmodified view always re-encodes to the identical bytes.

use alloc::vec;
use alloc::vec::Vec;

use crate::bits::{get_bits, set_bits};
use crate::layout::PageTableCaps;
use crate::types::{CodecError, StructHeader, StructPtr, StructType, Uuid128};

/// Raw view over any control structure: header plus bit-addressed payload.
///
/// Unknown structure types decode fine; the caller just gets no typed
/// accessors for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructView {
    raw: Vec<u8>,
    header: StructHeader,
}

impl StructView {
    /// Decode a structure at the start of `buf`, taking `header.byte_len()`
    /// bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let header = StructHeader::decode(buf)?;
        let len = header.byte_len();
        if buf.len() < len {
            return Err(CodecError::Truncated {
                need: len,
                have: buf.len(),
            });
        }
        Ok(Self {
            raw: buf[..len].to_vec(),
            header,
        })
    }

    /// Fresh zeroed structure with an encoded header.
    pub fn zeroed(ty: StructType, vers: u8, byte_len: usize) -> Result<Self, CodecError> {
        let header = StructHeader::new(ty, vers, byte_len);
        let mut raw = vec![0u8; byte_len];
        header.encode(&mut raw)?;
        Ok(Self { raw, header })
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> StructHeader {
        self.header
    }

    /// Encoded bytes of the whole structure.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Read a bit field.
    pub fn bits(&self, bit: usize, width: usize) -> Result<u64, CodecError> {
        get_bits(&self.raw, bit, width)
    }

    /// Write a bit field.
    pub fn set(&mut self, bit: usize, width: usize, value: u64) -> Result<(), CodecError> {
        set_bits(&mut self.raw, bit, width, value)
    }

    /// Read a 32-bit structure pointer field.
    pub fn ptr(&self, bit: usize) -> Result<StructPtr, CodecError> {
        Ok(StructPtr::from_raw(self.bits(bit, 32)? as u32))
    }

    /// Write a 32-bit structure pointer field.
    pub fn set_ptr(&mut self, bit: usize, ptr: StructPtr) -> Result<(), CodecError> {
        self.set(bit, 32, u64::from(ptr.raw()))
    }

    /// Read a 128-bit identifier stored as `{low, high}` 64-bit halves.
    pub fn uuid(&self, bit_low: usize) -> Result<Uuid128, CodecError> {
        let low = self.bits(bit_low, 64)?;
        let high = self.bits(bit_low + 64, 64)?;
        Ok(Uuid128::from_halves(high, low))
    }

    /// Write a 128-bit identifier as `{low, high}` 64-bit halves.
    pub fn set_uuid(&mut self, bit_low: usize, id: Uuid128) -> Result<(), CodecError> {
        self.set(bit_low, 64, id.low())?;
        self.set(bit_low + 64, 64, id.high())
    }

    fn expect_type(self, expected: StructType) -> Result<Self, CodecError> {
        if self.header.ty() != expected {
            return Err(CodecError::WrongType {
                expected,
                found: self.header.ty(),
            });
        }
        Ok(self)
    }
}

macro_rules! field_u64 {
    ($(#[$doc:meta])* $get:ident, $set:ident, $bit:expr, $width:expr) => {
        $(#[$doc])*
        pub fn $get(&self) -> Result<u64, CodecError> {
            self.view.bits($bit, $width)
        }

        /// Setter for the same field.
        pub fn $set(&mut self, value: u64) -> Result<(), CodecError> {
            self.view.set($bit, $width, value)
        }
    };
}

/// Component core structure, the root of the structure pointer graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStruct {
    view: StructView,
}

impl CoreStruct {
    /// Size of the core structure in bytes.
    pub const BYTE_LEN: usize = 0x100;

    const CLASS_UUID: usize = 64;
    const SERIAL: usize = 192;
    const CAP1: usize = 256;
    const CSTATE: usize = 288;
    const COMP_ENB: usize = 291;
    const FWD_ENB: usize = 292;
    const CID: usize = 320;
    const SID: usize = 336;
    const MGR_UUID: usize = 384;
    const IFACE_PTR: usize = 512;
    const IFACE_COUNT: usize = 544;
    const SWITCH_PTR: usize = 576;
    const DEST_TABLE_PTR: usize = 608;
    const COMP_TIMEOUT: usize = 640;
    const STICKY: usize = 672;
    const PAGE_GRID_PTR: usize = 704;

    /// Decode a core structure from a control-space read.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::decode(buf)?.expect_type(StructType::Core)?,
        })
    }

    /// Fresh zeroed core structure (model/test use).
    pub fn zeroed() -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::zeroed(StructType::Core, 1, Self::BYTE_LEN)?,
        })
    }

    /// Component class UUID (read-only identity).
    pub fn class_uuid(&self) -> Result<Uuid128, CodecError> {
        self.view.uuid(Self::CLASS_UUID)
    }

    /// Set the class UUID (model/test use; hardware burns this in).
    pub fn set_class_uuid(&mut self, id: Uuid128) -> Result<(), CodecError> {
        self.view.set_uuid(Self::CLASS_UUID, id)
    }

    /// Manager UUID; non-nil once a fabric manager claimed the component.
    pub fn mgr_uuid(&self) -> Result<Uuid128, CodecError> {
        self.view.uuid(Self::MGR_UUID)
    }

    /// Claim or release ownership by writing the manager UUID.
    pub fn set_mgr_uuid(&mut self, id: Uuid128) -> Result<(), CodecError> {
        self.view.set_uuid(Self::MGR_UUID, id)
    }

    field_u64!(
        /// Component serial number.
        serial, set_serial, Self::SERIAL, 64
    );
    field_u64!(
        /// Capability word 1.
        cap1, set_cap1, Self::CAP1, 32
    );
    field_u64!(
        /// Component state as a raw 3-bit code.
        cstate, set_cstate, Self::CSTATE, 3
    );
    field_u64!(
        /// Component enable bit; setting it moves C-CFG to C-Up.
        comp_enb, set_comp_enb, Self::COMP_ENB, 1
    );
    field_u64!(
        /// Forwarding enable bit.
        fwd_enb, set_fwd_enb, Self::FWD_ENB, 1
    );
    field_u64!(
        /// Component identifier within the subnet.
        cid, set_cid, Self::CID, 12
    );
    field_u64!(
        /// Subnet identifier.
        sid, set_sid, Self::SID, 16
    );
    field_u64!(
        /// Number of interfaces the component exposes.
        iface_count, set_iface_count, Self::IFACE_COUNT, 12
    );
    field_u64!(
        /// Configuration-timeout window, in milliseconds.
        comp_timeout, set_comp_timeout, Self::COMP_TIMEOUT, 32
    );
    field_u64!(
        /// Sticky status bits; write-one-to-clear.
        sticky, set_sticky, Self::STICKY, 32
    );

    /// Pointer to the first interface structure.
    pub fn iface_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::IFACE_PTR)
    }

    /// Set the interface structure pointer (model/test use).
    pub fn set_iface_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::IFACE_PTR, ptr)
    }

    /// Pointer to the switch structure; null on non-switch components.
    pub fn switch_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::SWITCH_PTR)
    }

    /// Set the switch structure pointer (model/test use).
    pub fn set_switch_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::SWITCH_PTR, ptr)
    }

    /// Pointer to the component destination table.
    pub fn dest_table_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::DEST_TABLE_PTR)
    }

    /// Set the destination table pointer (model/test use).
    pub fn set_dest_table_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::DEST_TABLE_PTR, ptr)
    }

    /// Pointer to the page grid; null when the component has no pages.
    pub fn page_grid_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::PAGE_GRID_PTR)
    }

    /// Set the page grid pointer (model/test use).
    pub fn set_page_grid_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::PAGE_GRID_PTR, ptr)
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }
}

/// Per-interface control structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStruct {
    view: StructView,
}

impl InterfaceStruct {
    /// Size of one interface structure in bytes.
    pub const BYTE_LEN: usize = 0x80;

    const ISTATE: usize = 32;
    const PHY_STATE: usize = 35;
    const IENABLE: usize = 38;
    const PEER_CID: usize = 64;
    const PEER_SID: usize = 80;
    const PEER_IFACE: usize = 96;
    const PEER_VALID: usize = 108;
    const NONCE: usize = 128;
    const LCTL_OP: usize = 192;
    const LCTL_STATUS: usize = 196;
    const PATH_TIME: usize = 256;
    const STICKY: usize = 320;
    const REMOTE_NONCE: usize = 448;

    /// Decode an interface structure from a control-space read.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::decode(buf)?.expect_type(StructType::Interface)?,
        })
    }

    /// Fresh zeroed interface structure (model/test use).
    pub fn zeroed() -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::zeroed(StructType::Interface, 1, Self::BYTE_LEN)?,
        })
    }

    field_u64!(
        /// Interface state as a raw 3-bit code.
        istate, set_istate, Self::ISTATE, 3
    );
    field_u64!(
        /// PHY sub-state as a raw 3-bit code.
        phy_state, set_phy_state, Self::PHY_STATE, 3
    );
    field_u64!(
        /// Interface enable bit.
        ienable, set_ienable, Self::IENABLE, 1
    );
    field_u64!(
        /// Peer component identifier, valid when `peer_valid` is set.
        peer_cid, set_peer_cid, Self::PEER_CID, 12
    );
    field_u64!(
        /// Peer subnet identifier.
        peer_sid, set_peer_sid, Self::PEER_SID, 16
    );
    field_u64!(
        /// Peer interface number.
        peer_iface, set_peer_iface, Self::PEER_IFACE, 12
    );
    field_u64!(
        /// Whether the peer fields hold exchanged values.
        peer_valid, set_peer_valid, Self::PEER_VALID, 1
    );
    field_u64!(
        /// Link nonce exchanged during bring-up.
        nonce, set_nonce, Self::NONCE, 64
    );
    field_u64!(
        /// Link-control opcode register.
        lctl_op, set_lctl_op, Self::LCTL_OP, 4
    );
    field_u64!(
        /// Link-control completion status.
        lctl_status, set_lctl_status, Self::LCTL_STATUS, 3
    );
    field_u64!(
        /// Measured path time from the path-time exchange.
        path_time, set_path_time, Self::PATH_TIME, 32
    );
    field_u64!(
        /// Sticky status bits; write-one-to-clear.
        sticky, set_sticky, Self::STICKY, 32
    );
    field_u64!(
        /// Last nonce the peer deposited over the link.
        remote_nonce, set_remote_nonce, Self::REMOTE_NONCE, 64
    );

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }
}

/// Switch structure owning the forwarding tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchStruct {
    view: StructView,
}

impl SwitchStruct {
    /// Size of the switch structure in bytes.
    pub const BYTE_LEN: usize = 0x40;

    const SW_ENB: usize = 32;
    const SSDT_PTR: usize = 64;
    const SSDT_ROWS: usize = 96;

    /// Decode a switch structure from a control-space read.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::decode(buf)?.expect_type(StructType::Switch)?,
        })
    }

    /// Fresh zeroed switch structure (model/test use).
    pub fn zeroed() -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::zeroed(StructType::Switch, 1, Self::BYTE_LEN)?,
        })
    }

    field_u64!(
        /// Switch forwarding enable.
        sw_enb, set_sw_enb, Self::SW_ENB, 1
    );
    field_u64!(
        /// Row count of the destination table.
        ssdt_rows, set_ssdt_rows, Self::SSDT_ROWS, 16
    );

    /// Pointer to the destination table structure.
    pub fn ssdt_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::SSDT_PTR)
    }

    /// Set the destination table pointer (model/test use).
    pub fn set_ssdt_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::SSDT_PTR, ptr)
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }
}

/// One packed destination-table entry.
///
/// Rows live behind the table structure's header at 16 bytes per entry;
/// they carry no header of their own. Entry 0 of each destination's row set
/// is the summary entry mirroring the minimum hop count of the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestTableRow {
    raw: [u8; Self::ROW_BYTES],
}

impl DestTableRow {
    /// Bytes per table entry, the hardware minimum write unit.
    pub const ROW_BYTES: usize = 16;

    const VALID: usize = 0;
    const EGRESS: usize = 1;
    const HOP_COUNT: usize = 16;

    /// Decode one entry from a 16-byte slice.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < Self::ROW_BYTES {
            return Err(CodecError::Truncated {
                need: Self::ROW_BYTES,
                have: buf.len(),
            });
        }
        let mut raw = [0u8; Self::ROW_BYTES];
        raw.copy_from_slice(&buf[..Self::ROW_BYTES]);
        Ok(Self { raw })
    }

    /// Fresh invalid entry.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            raw: [0u8; Self::ROW_BYTES],
        }
    }

    /// Whether the entry is programmed.
    pub fn valid(&self) -> Result<bool, CodecError> {
        Ok(get_bits(&self.raw, Self::VALID, 1)? == 1)
    }

    /// Set the valid bit.
    pub fn set_valid(&mut self, valid: bool) -> Result<(), CodecError> {
        set_bits(&mut self.raw, Self::VALID, 1, u64::from(valid))
    }

    /// Egress interface number.
    pub fn egress(&self) -> Result<u16, CodecError> {
        Ok(get_bits(&self.raw, Self::EGRESS, 12)? as u16)
    }

    /// Set the egress interface number.
    pub fn set_egress(&mut self, egress: u16) -> Result<(), CodecError> {
        set_bits(&mut self.raw, Self::EGRESS, 12, u64::from(egress))
    }

    /// Hop count toward the destination through this egress.
    pub fn hop_count(&self) -> Result<u8, CodecError> {
        Ok(get_bits(&self.raw, Self::HOP_COUNT, 6)? as u8)
    }

    /// Set the hop count.
    pub fn set_hop_count(&mut self, hc: u8) -> Result<(), CodecError> {
        set_bits(&mut self.raw, Self::HOP_COUNT, 6, u64::from(hc))
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// One packed access-control table entry gating a requester pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessTableRow {
    raw: [u8; Self::ROW_BYTES],
}

impl AccessTableRow {
    /// Bytes per table entry.
    pub const ROW_BYTES: usize = 16;

    const VALID: usize = 0;
    const AKEY: usize = 8;

    /// Decode one entry from a 16-byte slice.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < Self::ROW_BYTES {
            return Err(CodecError::Truncated {
                need: Self::ROW_BYTES,
                have: buf.len(),
            });
        }
        let mut raw = [0u8; Self::ROW_BYTES];
        raw.copy_from_slice(&buf[..Self::ROW_BYTES]);
        Ok(Self { raw })
    }

    /// Fresh no-access entry (key zero, invalid).
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            raw: [0u8; Self::ROW_BYTES],
        }
    }

    /// Whether the entry grants access.
    pub fn valid(&self) -> Result<bool, CodecError> {
        Ok(get_bits(&self.raw, Self::VALID, 1)? == 1)
    }

    /// Set the valid bit.
    pub fn set_valid(&mut self, valid: bool) -> Result<(), CodecError> {
        set_bits(&mut self.raw, Self::VALID, 1, u64::from(valid))
    }

    /// Access key granted to the pair.
    pub fn akey(&self) -> Result<u8, CodecError> {
        Ok(get_bits(&self.raw, Self::AKEY, 6)? as u8)
    }

    /// Set the access key.
    pub fn set_akey(&mut self, akey: u8) -> Result<(), CodecError> {
        set_bits(&mut self.raw, Self::AKEY, 6, u64::from(akey))
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// Page grid structure declaring page-table geometry and entry capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGridStruct {
    view: StructView,
}

impl PageGridStruct {
    /// Size of the page grid structure in bytes.
    pub const BYTE_LEN: usize = 0x40;

    const PTE_CAPS: usize = 32;
    const PTE_BITS: usize = 64;
    const PT_PTR: usize = 96;
    const PTE_COUNT: usize = 128;

    /// Decode a page grid from a control-space read.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::decode(buf)?.expect_type(StructType::PageGrid)?,
        })
    }

    /// Fresh zeroed page grid (model/test use).
    pub fn zeroed() -> Result<Self, CodecError> {
        Ok(Self {
            view: StructView::zeroed(StructType::PageGrid, 1, Self::BYTE_LEN)?,
        })
    }

    /// Capability bits driving the page-table-entry layout.
    ///
    /// Bits the codec does not know are dropped; sibling-structure reads are
    /// exactly how computed layouts obtain their shape.
    pub fn pte_caps(&self) -> Result<PageTableCaps, CodecError> {
        Ok(PageTableCaps::from_bits_truncate(
            self.view.bits(Self::PTE_CAPS, 32)? as u32,
        ))
    }

    /// Set the capability bits (model/test use).
    pub fn set_pte_caps(&mut self, caps: PageTableCaps) -> Result<(), CodecError> {
        self.view.set(Self::PTE_CAPS, 32, u64::from(caps.bits()))
    }

    field_u64!(
        /// Declared page-table-entry size in bits.
        pte_bits, set_pte_bits, Self::PTE_BITS, 16
    );
    field_u64!(
        /// Number of page-table entries.
        pte_count, set_pte_count, Self::PTE_COUNT, 16
    );

    /// Pointer to the page table structure.
    pub fn pt_ptr(&self) -> Result<StructPtr, CodecError> {
        self.view.ptr(Self::PT_PTR)
    }

    /// Set the page table pointer (model/test use).
    pub fn set_pt_ptr(&mut self, ptr: StructPtr) -> Result<(), CodecError> {
        self.view.set_ptr(Self::PT_PTR, ptr)
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_decode_then_encode_is_identity() {
        let mut core = CoreStruct::zeroed().expect("zeroed core");
        core.set_cid(0x123).expect("cid");
        core.set_sid(0xbeef).expect("sid");
        core.set_serial(0xdead_beef_cafe_f00d).expect("serial");
        core.set_class_uuid(Uuid128::from_value(0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00))
            .expect("uuid");
        let bytes = core.as_bytes().to_vec();
        let back = CoreStruct::decode(&bytes).expect("decode");
        assert_eq!(back.as_bytes(), &bytes[..]);
        assert_eq!(back.cid().expect("cid"), 0x123);
        assert_eq!(
            back.class_uuid().expect("uuid").value(),
            0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00
        );
    }

    #[test]
    fn decode_rejects_wrong_type() {
        let sw = SwitchStruct::zeroed().expect("zeroed switch");
        assert!(matches!(
            CoreStruct::decode(sw.as_bytes()),
            Err(CodecError::WrongType { .. })
        ));
    }

    #[test]
    fn unknown_structure_is_viewable() {
        let view = StructView::zeroed(StructType::Unknown(0x3fe), 2, 0x20).expect("zeroed");
        let back = StructView::decode(view.as_bytes()).expect("decode");
        assert_eq!(back.header().ty(), StructType::Unknown(0x3fe));
        assert_eq!(back.header().byte_len(), 0x20);
    }

    #[test]
    fn dest_row_fields_round_trip() {
        let mut row = DestTableRow::zeroed();
        row.set_valid(true).expect("valid");
        row.set_egress(0x2a).expect("egress");
        row.set_hop_count(5).expect("hc");
        let back = DestTableRow::decode(row.as_bytes()).expect("decode");
        assert!(back.valid().expect("valid"));
        assert_eq!(back.egress().expect("egress"), 0x2a);
        assert_eq!(back.hop_count().expect("hc"), 5);
    }

    #[test]
    fn page_grid_caps_drop_unknown_bits() {
        let mut grid = PageGridStruct::zeroed().expect("zeroed grid");
        grid.view.set(32, 32, 0xffff_ffff).expect("raw caps");
        let caps = grid.pte_caps().expect("caps");
        assert_eq!(caps, PageTableCaps::all());
    }
}
