// Author: Lukas Bower
// Purpose: Bit-granular field access over little-endian control-space buffers.

//! Bit-addressed reads and writes over byte buffers.
//!
//! Hardware fields have arbitrary bit widths at arbitrary bit offsets and
//! routinely cross byte and 64-bit word boundaries. Bit `i` of a buffer is
//! bit `i % 8` of byte `i / 8`, matching the little-endian register images
//! the control space exposes.

use crate::types::CodecError;

/// Read `width` bits (1..=64) starting at absolute bit offset `bit`.
pub fn get_bits(buf: &[u8], bit: usize, width: usize) -> Result<u64, CodecError> {
    check_range(buf, bit, width)?;
    let mut value: u64 = 0;
    for i in 0..width {
        let pos = bit + i;
        let byte = buf[pos / 8];
        if byte >> (pos % 8) & 1 == 1 {
            value |= 1 << i;
        }
    }
    Ok(value)
}

/// Write `width` bits (1..=64) of `value` starting at absolute bit offset
/// `bit`. Bits outside the field are left untouched.
pub fn set_bits(buf: &mut [u8], bit: usize, width: usize, value: u64) -> Result<(), CodecError> {
    check_range(buf, bit, width)?;
    if width < 64 && value >> width != 0 {
        return Err(CodecError::ValueTooWide { value, width });
    }
    for i in 0..width {
        let pos = bit + i;
        let mask = 1u8 << (pos % 8);
        if value >> i & 1 == 1 {
            buf[pos / 8] |= mask;
        } else {
            buf[pos / 8] &= !mask;
        }
    }
    Ok(())
}

/// Whether a freshly-read buffer holds the all-ones unprogrammed sentinel.
///
/// Hardware returns all-ones for reads that hit an unprogrammed or failed
/// component; callers treat it as a data-integrity signal, never as data.
#[must_use]
pub fn is_sentinel(buf: &[u8]) -> bool {
    !buf.is_empty() && buf.iter().all(|&b| b == 0xff)
}

fn check_range(buf: &[u8], bit: usize, width: usize) -> Result<(), CodecError> {
    debug_assert!(width >= 1 && width <= 64);
    let end = bit + width;
    if end > buf.len() * 8 {
        return Err(CodecError::FieldOutOfRange {
            name: "<raw>",
            bit,
            width,
        });
    }
    Ok(())
}
