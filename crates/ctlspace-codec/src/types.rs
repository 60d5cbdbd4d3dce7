// Author: Lukas Bower
// Purpose: Define control-space structure headers, pointers and identifiers.
#![allow(clippy::module_name_repetitions)]

//! Control-space data model shared across codec consumers.

use core::fmt;

/// Granularity of structure pointers: stored values count 16-byte units.
pub const STRUCT_PTR_UNIT: usize = 16;

/// Possible errors produced while decoding or encoding control structures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer was shorter than the structure requires.
    #[error("truncated structure: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes the structure layout requires.
        need: usize,
        /// Bytes actually present.
        have: usize,
    },
    /// The buffer holds the all-ones unprogrammed sentinel.
    #[error("buffer holds the all-ones sentinel")]
    Sentinel,
    /// A field access fell outside the structure.
    #[error("field {name} at bit {bit} width {width} exceeds structure")]
    FieldOutOfRange {
        /// Field name.
        name: &'static str,
        /// Bit offset of the access.
        bit: usize,
        /// Bit width of the access.
        width: usize,
    },
    /// A field value does not fit the field's declared width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide {
        /// Value supplied by the caller.
        value: u64,
        /// Declared bit width.
        width: usize,
    },
    /// A computed layout exceeds the caller-declared entry size.
    #[error("layout needs {need} bits but entry declares {declared}")]
    LayoutOverflow {
        /// Bits the field list requires before padding.
        need: usize,
        /// Bits declared by the entry size.
        declared: usize,
    },
    /// The header declares a different structure type than expected.
    #[error("expected structure type {expected:?}, found {found:?}")]
    WrongType {
        /// Type the caller asked for.
        expected: StructType,
        /// Type found in the header.
        found: StructType,
    },
    /// A structure pointer is null or points outside the control space.
    #[error("structure pointer {0:#x} is not followable")]
    BadPointer(u32),
}

/// Control structure type discriminator from the header `type` field.
///
/// Unknown discriminators decode to [`StructType::Unknown`]; they are a
/// placeholder for forward compatibility, never a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructType {
    /// Component core structure, root of the structure graph.
    Core,
    /// Per-interface structure.
    Interface,
    /// Switch structure owning the routing tables.
    Switch,
    /// Destination table (SSDT/LPRT row storage).
    DestTable,
    /// Page grid describing page-table geometry.
    PageGrid,
    /// Page table holding computed-layout entries.
    PageTable,
    /// Access-control table holding per-pair key rows.
    AccessTable,
    /// Any type this codec has no layout for.
    Unknown(u16),
}

impl StructType {
    /// Decode a raw 12-bit type discriminator.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw & 0x0fff {
            0x000 => StructType::Core,
            0x001 => StructType::Interface,
            0x002 => StructType::Switch,
            0x003 => StructType::DestTable,
            0x004 => StructType::PageGrid,
            0x005 => StructType::PageTable,
            0x006 => StructType::AccessTable,
            other => StructType::Unknown(other),
        }
    }

    /// Raw 12-bit discriminator for this type.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            StructType::Core => 0x000,
            StructType::Interface => 0x001,
            StructType::Switch => 0x002,
            StructType::DestTable => 0x003,
            StructType::PageGrid => 0x004,
            StructType::PageTable => 0x005,
            StructType::AccessTable => 0x006,
            StructType::Unknown(raw) => raw & 0x0fff,
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructType::Unknown(raw) => write!(f, "unknown({raw:#05x})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Packed `(type, vers, size)` header occupying the first 32 bits of every
/// control structure. `size` counts 16-byte units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructHeader {
    ty: StructType,
    vers: u8,
    size_units: u16,
}

impl StructHeader {
    /// Construct a header for a structure of `byte_len` bytes.
    ///
    /// `byte_len` must be a multiple of [`STRUCT_PTR_UNIT`].
    #[must_use]
    pub fn new(ty: StructType, vers: u8, byte_len: usize) -> Self {
        debug_assert_eq!(byte_len % STRUCT_PTR_UNIT, 0);
        Self {
            ty,
            vers: vers & 0x0f,
            size_units: (byte_len / STRUCT_PTR_UNIT) as u16,
        }
    }

    /// Decode the header from the first four bytes of a buffer.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < 4 {
            return Err(CodecError::Truncated {
                need: 4,
                have: buf.len(),
            });
        }
        let word = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok(Self {
            ty: StructType::from_raw((word & 0x0fff) as u16),
            vers: ((word >> 12) & 0x0f) as u8,
            size_units: (word >> 16) as u16,
        })
    }

    /// Encode the header into the first four bytes of a buffer.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() < 4 {
            return Err(CodecError::Truncated {
                need: 4,
                have: buf.len(),
            });
        }
        let word = u32::from(self.ty.to_raw())
            | (u32::from(self.vers) << 12)
            | (u32::from(self.size_units) << 16);
        buf[..4].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    /// Structure type discriminator.
    #[must_use]
    pub fn ty(&self) -> StructType {
        self.ty
    }

    /// Structure version.
    #[must_use]
    pub fn vers(&self) -> u8 {
        self.vers
    }

    /// Declared structure length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.size_units as usize * STRUCT_PTR_UNIT
    }
}

/// Component-local structure pointer at 16-byte granularity.
///
/// The stored value multiplied by [`STRUCT_PTR_UNIT`] yields the byte offset
/// of the target structure inside the component's control space. Zero is the
/// null pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StructPtr(u32);

impl StructPtr {
    /// The null pointer.
    pub const NULL: StructPtr = StructPtr(0);

    /// Wrap a raw pointer value as read from hardware.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Build a pointer to the given byte offset.
    ///
    /// Returns `None` if the offset is not 16-byte aligned.
    #[must_use]
    pub fn to_offset(byte_offset: usize) -> Option<Self> {
        if byte_offset % STRUCT_PTR_UNIT != 0 {
            return None;
        }
        Some(Self((byte_offset / STRUCT_PTR_UNIT) as u32))
    }

    /// Raw pointer value as written to hardware.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the null pointer.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset of the target structure.
    ///
    /// Fails with [`CodecError::BadPointer`] on the null pointer.
    pub fn follow(self) -> Result<usize, CodecError> {
        if self.is_null() {
            return Err(CodecError::BadPointer(self.0));
        }
        Ok(self.0 as usize * STRUCT_PTR_UNIT)
    }
}

/// 128-bit identifier stored on the wire as two little-endian 64-bit halves
/// of a big-endian value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uuid128(u128);

impl Uuid128 {
    /// Construct from the logical big-endian value.
    #[must_use]
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Reassemble from the `{high, low}` halves as read from hardware.
    #[must_use]
    pub fn from_halves(high: u64, low: u64) -> Self {
        Self((u128::from(high) << 64) | u128::from(low))
    }

    /// High 64 bits as stored in the structure's upper half-field.
    #[must_use]
    pub fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Low 64 bits as stored in the structure's lower half-field.
    #[must_use]
    pub fn low(self) -> u64 {
        self.0 as u64
    }

    /// The logical 128-bit value.
    #[must_use]
    pub fn value(self) -> u128 {
        self.0
    }

    /// Whether the identifier is all zeroes (unassigned).
    #[must_use]
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let hdr = StructHeader::new(StructType::DestTable, 3, 0x40);
        let mut buf = [0u8; 4];
        hdr.encode(&mut buf).expect("encode header");
        assert_eq!(StructHeader::decode(&buf).expect("decode header"), hdr);
        assert_eq!(hdr.byte_len(), 0x40);
    }

    #[test]
    fn unknown_type_is_a_placeholder_not_an_error() {
        let hdr = StructHeader::new(StructType::Unknown(0x7ab), 1, 0x10);
        let mut buf = [0u8; 4];
        hdr.encode(&mut buf).expect("encode header");
        let back = StructHeader::decode(&buf).expect("decode header");
        assert_eq!(back.ty(), StructType::Unknown(0x7ab));
    }

    #[test]
    fn struct_ptr_granularity() {
        assert_eq!(StructPtr::to_offset(0x30), Some(StructPtr::from_raw(3)));
        assert_eq!(StructPtr::to_offset(0x31), None);
        assert_eq!(StructPtr::from_raw(3).follow(), Ok(0x30));
        assert_eq!(
            StructPtr::NULL.follow(),
            Err(CodecError::BadPointer(0))
        );
    }

    #[test]
    fn uuid_half_reassembly() {
        let id = Uuid128::from_value(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        let back = Uuid128::from_halves(id.high(), id.low());
        assert_eq!(back, id);
        assert_eq!(back.high(), 0x0123_4567_89ab_cdef);
        assert_eq!(back.low(), 0xfedc_ba98_7654_3210);
    }
}
