//! Zig-zag varint encoding for residual streams
//!
//! Signed values are zig-zag mapped (`0, -1, 1, -2, ...` → `0, 1, 2, 3, ...`)
//! and then written as little-endian base-128 groups with a continuation bit,
//! so small magnitudes take a single byte.

use crate::error::{CompressionError, Result};

/// Longest valid encoding of a u64
const MAX_VARINT_LEN: usize = 10;

/// Encode a signed integer using zigzag encoding
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decode a zigzag-encoded unsigned integer to signed
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

/// Append an unsigned varint
pub fn write_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read an unsigned varint, returning the value and bytes consumed
///
/// Truncated input and encodings longer than ten bytes (or overflowing u64)
/// are rejected.
pub fn read_uvarint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(CompressionError::corrupt("varint overflows 64 bits"));
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
        if i + 1 >= MAX_VARINT_LEN {
            return Err(CompressionError::corrupt("varint longer than 10 bytes"));
        }
    }

    Err(CompressionError::EndOfStream {
        requested: 8,
        remaining: 0,
    })
}

/// Append a signed (zig-zag) varint
#[inline]
pub fn marshal_var_int64(buf: &mut Vec<u8>, value: i64) {
    write_uvarint(buf, zigzag_encode(value));
}

/// Append every value as a signed varint
pub fn marshal_var_int64s(buf: &mut Vec<u8>, values: &[i64]) {
    for &v in values {
        write_uvarint(buf, zigzag_encode(v));
    }
}

/// Read one signed varint, returning the value and the remaining input
pub fn unmarshal_var_int64(src: &[u8]) -> Result<(i64, &[u8])> {
    let (v, n) = read_uvarint(src)?;
    Ok((zigzag_decode(v), &src[n..]))
}

/// Read exactly `count` signed varints into `dst`, returning the remaining input
pub fn unmarshal_var_int64s<'a>(dst: &mut Vec<i64>, src: &'a [u8], count: usize) -> Result<&'a [u8]> {
    let mut rest = src;
    for decoded in 0..count {
        if rest.is_empty() {
            return Err(CompressionError::corrupt(format!(
                "expected {} varints, input ended after {}",
                count, decoded
            )));
        }
        let (v, n) = read_uvarint(rest)?;
        dst.push(zigzag_decode(v));
        rest = &rest[n..];
    }
    Ok(rest)
}

/// Read exactly `count` varints and require the input to be fully consumed
pub fn unmarshal_var_int64s_exact(dst: &mut Vec<i64>, src: &[u8], count: usize) -> Result<()> {
    let tail = unmarshal_var_int64s(dst, src, count)?;
    if !tail.is_empty() {
        return Err(CompressionError::corrupt(format!(
            "unexpected tail left after unmarshaling {} items from {} bytes; tail size={}",
            count,
            src.len(),
            tail.len()
        )));
    }
    Ok(())
}
