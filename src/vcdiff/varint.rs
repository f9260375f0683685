// VCDIFF variable-length integers (RFC 3284, Section 2).
//
// Base-128, big-endian: most-significant group first. Every byte but the
// last has bit 7 set. A value never takes more than 10 groups.

use std::io::{Read, Write};

use crate::error::{DeltaError, Result};

/// Maximum number of 7-bit groups in one integer.
pub const MAX_VARINT_LEN: usize = 10;

/// Set when the next `<< 7` would push bits out of a `u64`.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into the tail of `buf`, returning the number of bytes used.
///
/// The encoded integer occupies `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_into(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F;
    MAX_VARINT_LEN - i
}

/// Append the encoding of `num` to `out`.
pub fn encode(num: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_into(num, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

/// Number of bytes `encode(num)` produces.
#[inline]
pub fn encoded_len(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    bits.max(1).div_ceil(7) as usize
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode an integer starting at `buf[*pos]`, advancing `pos` past it.
///
/// Fails with `NumberEncoding` when the integer runs off the end of `buf`
/// or spans more than ten groups, and with `IntegerOverflow` when a
/// ten-group value does not fit in 64 bits.
pub fn decode(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut val: u64 = 0;
    let mut i = *pos;
    for _ in 0..MAX_VARINT_LEN {
        let &byte = buf.get(i).ok_or(DeltaError::NumberEncoding)?;
        i += 1;
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(DeltaError::IntegerOverflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            *pos = i;
            return Ok(val);
        }
    }
    Err(DeltaError::NumberEncoding)
}

/// Whether `decode` on `buf` would fail only because the buffer ended
/// before the integer's final group.
pub fn is_truncated(buf: &[u8]) -> bool {
    buf.len() < MAX_VARINT_LEN && buf.iter().all(|&b| b & 0x80 != 0)
}

/// Narrow a decoded value to `usize`.
#[inline]
pub fn to_usize(val: u64) -> Result<usize> {
    usize::try_from(val).map_err(|_| DeltaError::IntegerOverflow)
}

// ---------------------------------------------------------------------------
// Stream I/O
// ---------------------------------------------------------------------------

/// Read one integer from a byte stream. A short read is `IncompleteRead`.
pub fn read_varint<R: Read + ?Sized>(r: &mut R) -> Result<u64> {
    let mut val: u64 = 0;
    let mut byte = [0u8; 1];
    for _ in 0..MAX_VARINT_LEN {
        r.read_exact(&mut byte)?;
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(DeltaError::IntegerOverflow);
        }
        val = (val << 7) | u64::from(byte[0] & 0x7F);
        if byte[0] & 0x80 == 0 {
            return Ok(val);
        }
    }
    Err(DeltaError::NumberEncoding)
}

/// Write one integer to a byte stream.
pub fn write_varint<W: Write + ?Sized>(w: &mut W, num: u64) -> Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_into(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
