//! TSXor sliding-dictionary codec
//!
//! Each value is described against the last (up to) 127 values, in one of
//! three byte-aligned shapes:
//!
//! ```text
//! 0iiiiiii                                equals window[i]
//! 1iiiiiii + tz(4) len(4) + len bytes     XOR residual against window[i]
//! 11111111 + value(64)                    exception literal
//! ```
//!
//! `window[0]` is the oldest entry; the search runs newest first and a
//! residual needs at least two zero bytes to beat the exception. Residual
//! bytes are little-endian after dropping `tz` zero bytes; literals are
//! big-endian. Index 127 never names an entry, so `0xFF` is unambiguous.
//!
//! Framing: the first value as 8 big-endian bytes, no count header.

use super::{check_block, check_first, Codec, CodecId};
use crate::error::{CompressionError, Result};
use crate::types::MAX_BLOCK_ITEMS;

/// Entries kept in the dictionary
const WINDOW: usize = 127;

const EXCEPTION: u8 = 0xFF;
const RESIDUAL_FLAG: u8 = 0x80;

/// TSXor codec
#[derive(Debug, Clone, Copy, Default)]
pub struct TsXorCodec;

impl TsXorCodec {
    /// Create a codec
    pub fn new() -> Self {
        Self
    }
}

enum Shape {
    Reference(usize),
    Residual(usize, u64),
    Exception,
}

/// Dictionary view over the values decoded so far
#[inline]
fn window_of(history: &[i64]) -> &[i64] {
    &history[history.len().saturating_sub(WINDOW)..]
}

/// Zero bytes at both ends of `xor`
#[inline]
fn zero_bytes(xor: u64) -> u32 {
    xor.leading_zeros() / 8 + xor.trailing_zeros() / 8
}

fn search(window: &[i64], value: i64) -> Shape {
    let mut best = None;
    let mut best_zeros = 1;
    for (i, &candidate) in window.iter().enumerate().rev() {
        if candidate == value {
            return Shape::Reference(i);
        }
        let zeros = zero_bytes((candidate ^ value) as u64);
        if zeros > best_zeros {
            best_zeros = zeros;
            best = Some(i);
        }
    }

    match best {
        Some(i) => Shape::Residual(i, (window[i] ^ value) as u64),
        None => Shape::Exception,
    }
}

struct ByteCursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CompressionError::EndOfStream {
                requested: n * 8,
                remaining: self.remaining() * 8,
            });
        }
        let bytes = &self.src[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn be_i64(&mut self) -> Result<i64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(raw))
    }
}

impl Codec for TsXorCodec {
    fn id(&self) -> CodecId {
        CodecId::TsXor
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_BLOCK_ITEMS)?;

        let first = values[0];
        dst.extend_from_slice(&first.to_be_bytes());

        for i in 1..values.len() {
            match search(window_of(&values[..i]), values[i]) {
                Shape::Reference(index) => dst.push(index as u8),
                Shape::Residual(index, xor) => {
                    let tz = xor.trailing_zeros() / 8;
                    let len = 8 - zero_bytes(xor);
                    dst.push(RESIDUAL_FLAG | index as u8);
                    dst.push(((tz as u8) << 4) | len as u8);
                    let shifted = xor >> (tz * 8);
                    dst.extend_from_slice(&shifted.to_le_bytes()[..len as usize]);
                }
                Shape::Exception => {
                    dst.push(EXCEPTION);
                    dst.extend_from_slice(&values[i].to_be_bytes());
                }
            }
        }
        Ok(first)
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        if count == 0 {
            return Err(CompressionError::EmptyBlock { codec: self.name() });
        }

        let mut cursor = ByteCursor::new(src);
        check_first(cursor.be_i64()?, first)?;

        let start = dst.len();
        dst.push(first);
        for _ in 1..count {
            let tag = cursor.byte()?;
            let value = if tag == EXCEPTION {
                cursor.be_i64()?
            } else {
                let window = window_of(&dst[start..]);
                let index = (tag & !RESIDUAL_FLAG) as usize;
                let base = *window.get(index).ok_or_else(|| {
                    CompressionError::corrupt(format!(
                        "dictionary index {} outside a window of {} entries",
                        index,
                        window.len()
                    ))
                })?;

                if tag & RESIDUAL_FLAG == 0 {
                    base
                } else {
                    let header = cursor.byte()?;
                    let tz = (header >> 4) as usize;
                    let len = (header & 0x0F) as usize;
                    if len == 0 || tz + len > 8 {
                        return Err(CompressionError::corrupt(format!(
                            "residual of {} bytes after {} zero bytes",
                            len, tz
                        )));
                    }
                    let xor = cursor
                        .take(len)?
                        .iter()
                        .enumerate()
                        .fold(0u64, |acc, (j, &b)| acc | ((b as u64) << (8 * j)));
                    base ^ (xor << (8 * tz)) as i64
                }
            };
            dst.push(value);
        }

        if cursor.remaining() != 0 {
            return Err(CompressionError::corrupt(format!(
                "unexpected tail of {} bytes after {} items",
                cursor.remaining(),
                count
            )));
        }
        Ok(())
    }
}
