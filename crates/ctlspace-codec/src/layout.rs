// Author: Lukas Bower
// Purpose: Computed-layout builder and generic packer for page-table entries.

//! Capability-driven entry layouts.
//!
//! Page-table entries do not have a fixed shape: which optional fields exist,
//! their widths, and whether a field is physically split across two 64-bit
//! words all depend on capability bits read from the owning page grid. The
//! layout builder turns a capability set into an ordered field list; one
//! generic packer/unpacker consumes that list. No per-shape types are ever
//! generated at decode time.

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::bits::{get_bits, set_bits};
use crate::types::CodecError;

/// Width of the hardware word; fields marked non-splittable may not straddle
/// a boundary at this width.
const WORD_BITS: usize = 64;

bitflags! {
    /// Page-grid capability bits that drive page-table-entry layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageTableCaps: u32 {
        /// Entries carry a write-mode selector.
        const WRITE_MODE = 1 << 0;
        /// Entries carry a traffic-class field.
        const TRAFFIC_CLASS = 1 << 1;
        /// Entries carry cacheline attribute bits.
        const CACHE_ATTR = 1 << 2;
        /// Entries carry a locality cookie for interleave decoding.
        const LOC_COOKIE = 1 << 3;
        /// Entries carry a process address-space identifier.
        const PASID = 1 << 4;
        /// Entries carry a resource-key tag.
        const RKEY_TAG = 1 << 5;
    }
}

/// One logical field in a computed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name; stable across capability combinations.
    pub name: &'static str,
    /// Logical bit width (1..=64).
    pub width: usize,
    /// Whether the hardware stores the field as `{low, high}` sub-fields
    /// when it straddles a word boundary. Non-splittable fields are pushed
    /// to the next word boundary instead.
    pub may_split: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, width: usize, may_split: bool) -> Self {
        Self {
            name,
            width,
            may_split,
        }
    }
}

/// Ordered field list for a page-table entry under the given capabilities.
///
/// Field order is fixed; capability bits only gate which optional fields are
/// present. The address field is the one field wide enough to routinely
/// split.
#[must_use]
pub fn page_table_layout(caps: PageTableCaps) -> Vec<FieldSpec> {
    let mut fields = Vec::with_capacity(9);
    fields.push(FieldSpec::new("valid", 1, false));
    fields.push(FieldSpec::new("addr", 52, true));
    fields.push(FieldSpec::new("access", 2, false));
    if caps.contains(PageTableCaps::WRITE_MODE) {
        fields.push(FieldSpec::new("write_mode", 3, false));
    }
    if caps.contains(PageTableCaps::TRAFFIC_CLASS) {
        fields.push(FieldSpec::new("tc", 4, false));
    }
    if caps.contains(PageTableCaps::CACHE_ATTR) {
        fields.push(FieldSpec::new("cache_attr", 2, false));
    }
    if caps.contains(PageTableCaps::LOC_COOKIE) {
        fields.push(FieldSpec::new("loc_cookie", 16, true));
    }
    if caps.contains(PageTableCaps::PASID) {
        fields.push(FieldSpec::new("pasid", 20, true));
    }
    if caps.contains(PageTableCaps::RKEY_TAG) {
        fields.push(FieldSpec::new("rkey_tag", 6, false));
    }
    fields
}

/// A field placed at a concrete bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlacedField {
    name: &'static str,
    width: usize,
    bit: usize,
    /// Bits stored in the low sub-field when the field is split; equals
    /// `width` for unsplit fields.
    low_bits: usize,
}

/// A fully-placed layout: every field has a bit position, and reserved
/// padding fills the remainder of the declared entry size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    placed: Vec<PlacedField>,
    entry_bits: usize,
    used_bits: usize,
}

impl Layout {
    /// Place `fields` in order into an entry of `entry_bits` total bits.
    ///
    /// Splittable fields that straddle a word boundary become `{low, high}`
    /// physical sub-fields (the high part starting at the next word);
    /// non-splittable fields are aligned up to the next word boundary
    /// instead. Fails with [`CodecError::LayoutOverflow`] if the placed
    /// fields need more bits than the entry declares.
    pub fn build(fields: &[FieldSpec], entry_bits: usize) -> Result<Self, CodecError> {
        let mut placed = Vec::with_capacity(fields.len());
        let mut bit = 0usize;
        for f in fields {
            let room = WORD_BITS - bit % WORD_BITS;
            let (pos, low_bits) = if f.width <= room {
                (bit, f.width)
            } else if f.may_split {
                // Low sub-field fills the word; high continues at the next.
                (bit, room)
            } else {
                (bit + room, f.width)
            };
            placed.push(PlacedField {
                name: f.name,
                width: f.width,
                bit: pos,
                low_bits,
            });
            bit = pos + f.width;
        }
        if bit > entry_bits {
            return Err(CodecError::LayoutOverflow {
                need: bit,
                declared: entry_bits,
            });
        }
        Ok(Self {
            placed,
            entry_bits,
            used_bits: bit,
        })
    }

    /// Total declared entry size in bits.
    #[must_use]
    pub fn entry_bits(&self) -> usize {
        self.entry_bits
    }

    /// Bits consumed by placed fields; the rest is reserved padding.
    #[must_use]
    pub fn used_bits(&self) -> usize {
        self.used_bits
    }

    /// Reserved trailing padding in bits.
    #[must_use]
    pub fn padding_bits(&self) -> usize {
        self.entry_bits - self.used_bits
    }

    /// Names of the physical sub-fields, with split fields reported as
    /// `{name}` once per sub-field placement.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.placed.iter().map(|p| p.name).collect()
    }

    fn find(&self, name: &str) -> Result<PlacedField, CodecError> {
        self.placed
            .iter()
            .copied()
            .find(|p| p.name == name)
            .ok_or(CodecError::FieldOutOfRange {
                name: "<unknown>",
                bit: 0,
                width: 0,
            })
    }

    /// Whether the named field is physically split across two words.
    pub fn is_split(&self, name: &str) -> Result<bool, CodecError> {
        let p = self.find(name)?;
        Ok(p.low_bits != p.width)
    }
}

/// An entry buffer paired with its computed layout.
///
/// Decoding keeps the raw bytes; unmodified entries encode back to the
/// identical buffer, reserved padding included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    layout: Layout,
    raw: Vec<u8>,
}

impl PackedEntry {
    /// Wrap an entry buffer under `layout`.
    pub fn decode(layout: Layout, buf: &[u8]) -> Result<Self, CodecError> {
        let need = layout.entry_bits.div_ceil(8);
        if buf.len() < need {
            return Err(CodecError::Truncated {
                need,
                have: buf.len(),
            });
        }
        Ok(Self {
            layout,
            raw: buf[..need].to_vec(),
        })
    }

    /// Fresh all-zero entry under `layout`.
    #[must_use]
    pub fn zeroed(layout: Layout) -> Self {
        let len = layout.entry_bits.div_ceil(8);
        Self {
            layout,
            raw: alloc::vec![0u8; len],
        }
    }

    /// Read a logical field, reassembling split sub-fields.
    pub fn get(&self, name: &str) -> Result<u64, CodecError> {
        let p = self.layout.find(name)?;
        let low = get_bits(&self.raw, p.bit, p.low_bits)?;
        if p.low_bits == p.width {
            return Ok(low);
        }
        let high_start = (p.bit + p.low_bits).next_multiple_of(WORD_BITS);
        let high = get_bits(&self.raw, high_start, p.width - p.low_bits)?;
        Ok(low | high << p.low_bits)
    }

    /// Write a logical field, distributing split sub-fields.
    pub fn set(&mut self, name: &str, value: u64) -> Result<(), CodecError> {
        let p = self.layout.find(name)?;
        if p.width < 64 && value >> p.width != 0 {
            return Err(CodecError::ValueTooWide {
                value,
                width: p.width,
            });
        }
        let low_mask = if p.low_bits == 64 {
            u64::MAX
        } else {
            (1u64 << p.low_bits) - 1
        };
        set_bits(&mut self.raw, p.bit, p.low_bits, value & low_mask)?;
        if p.low_bits != p.width {
            let high_start = (p.bit + p.low_bits).next_multiple_of(WORD_BITS);
            set_bits(
                &mut self.raw,
                high_start,
                p.width - p.low_bits,
                value >> p.low_bits,
            )?;
        }
        Ok(())
    }

    /// The entry's layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Encoded bytes, padding included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cap_combination_fits_declared_size() {
        // 3 x 64-bit words is the largest entry geometry the grids declare.
        for raw in 0..=PageTableCaps::all().bits() {
            let caps = PageTableCaps::from_bits_truncate(raw);
            let fields = page_table_layout(caps);
            let layout = Layout::build(&fields, 192).expect("layout fits");
            assert!(layout.used_bits() <= 192);
            assert_eq!(layout.padding_bits(), 192 - layout.used_bits());
        }
    }

    #[test]
    fn overflow_is_detected() {
        let fields = page_table_layout(PageTableCaps::all());
        assert!(matches!(
            Layout::build(&fields, 64),
            Err(CodecError::LayoutOverflow { .. })
        ));
    }

    #[test]
    fn split_field_round_trips() {
        // valid(1) + addr(52) + access(2) + pasid(20): pasid starts at bit 55
        // and must split 9/11 across the first word boundary.
        let fields = page_table_layout(PageTableCaps::PASID);
        let layout = Layout::build(&fields, 128).expect("layout");
        assert!(layout.is_split("pasid").expect("pasid placed"));
        let mut entry = PackedEntry::zeroed(layout);
        entry.set("valid", 1).expect("set valid");
        entry.set("addr", 0xf_ffff_ffff_ffff).expect("set addr");
        entry.set("pasid", 0xabcde).expect("set pasid");
        assert_eq!(entry.get("pasid").expect("get pasid"), 0xabcde);
        assert_eq!(entry.get("addr").expect("get addr"), 0xf_ffff_ffff_ffff);
        assert_eq!(entry.get("valid").expect("get valid"), 1);
    }

    #[test]
    fn non_splittable_field_aligns_to_next_word() {
        // A 6-bit field at bit offset 61 with may_split=false moves to 64.
        let fields = [
            FieldSpec::new("a", 61, false),
            FieldSpec::new("b", 6, false),
        ];
        let layout = Layout::build(&fields, 128).expect("layout");
        let mut entry = PackedEntry::zeroed(layout);
        entry.set("b", 0x3f).expect("set b");
        assert_eq!(entry.get("b").expect("get b"), 0x3f);
        assert_eq!(entry.get("a").expect("get a"), 0);
        // Physical placement: bits 61..64 stay clear.
        assert_eq!(entry.as_bytes()[7] & 0xe0, 0);
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let fields = page_table_layout(PageTableCaps::all());
        let layout = Layout::build(&fields, 192).expect("layout");
        let mut original = alloc::vec![0u8; 24];
        for (i, b) in original.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        let entry = PackedEntry::decode(layout, &original).expect("decode");
        assert_eq!(entry.as_bytes(), &original[..]);
    }
}
