//! Chimp XOR codec
//!
//! Chimp refines Gorilla by rounding leading zeros down to an even count of
//! at most 14, so the count fits three bits, and by splitting the non-zero
//! case on the trailing zeros of the XOR:
//!
//! ```text
//! 00                              value repeats
//! 01 + lead/2(3) + centre(6) + centre bits     more than 6 trailing zeros
//! 10 + (64 - prev lead) bits                    leading zeros match previous
//! 11 + lead/2(3) + (64 - lead) bits             new leading zero count
//! ```
//!
//! Framing matches the Gorilla family: 64-bit first value, 14-bit count.
//!
//! # Reference
//!
//! Panagiotis Liakos, Katia Papakonstantinopoulou, and Yannis Kotidis.
//! "Chimp: Efficient Lossless Floating Point Compression for Time Series Databases."
//! VLDB 2022.

use super::{check_block, read_window_header, write_window_header, Codec, CodecId, MAX_ITEMS_14};
use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::error::{CompressionError, Result};

/// Trailing zeros above which the centre-bits form is used
const TRAILING_THRESHOLD: u32 = 6;

/// Chimp codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ChimpCodec;

impl ChimpCodec {
    /// Create a new Chimp codec
    pub fn new() -> Self {
        Self
    }
}

/// Leading zeros clamped to 15, then rounded down to even
#[inline]
fn rounded_leading(xor: u64) -> u32 {
    xor.leading_zeros().min(15) & !1
}

impl Codec for ChimpCodec {
    fn id(&self) -> CodecId {
        CodecId::Chimp
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_ITEMS_14)?;

        let first = values[0];
        let mut writer = BitWriter::new(dst);
        write_window_header(&mut writer, first, values.len());

        let mut prev = first as u64;
        let mut prev_lead: Option<u32> = None;
        for &v in &values[1..] {
            let xor = prev ^ v as u64;
            prev = v as u64;

            if xor == 0 {
                writer.write_bits(0b00, 2);
                continue;
            }

            let lead = rounded_leading(xor);
            let trail = xor.trailing_zeros();
            if trail > TRAILING_THRESHOLD {
                let centre = 64 - lead - trail;
                writer.write_bits(0b01, 2);
                writer.write_bits((lead / 2) as u64, 3);
                writer.write_bits(centre as u64, 6);
                writer.write_bits(xor >> trail, centre as u8);
            } else if prev_lead == Some(lead) {
                writer.write_bits(0b10, 2);
                writer.write_bits(xor, (64 - lead) as u8);
            } else {
                writer.write_bits(0b11, 2);
                writer.write_bits((lead / 2) as u64, 3);
                writer.write_bits(xor, (64 - lead) as u8);
            }
            prev_lead = Some(lead);
        }
        writer.finish();
        Ok(first)
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        let mut reader = BitReader::new(src);
        read_window_header(&mut reader, first, count)?;

        let mut prev = first as u64;
        let mut prev_lead: Option<u32> = None;
        dst.push(first);
        for _ in 1..count {
            let xor = match reader.read_bits(2)? {
                0b00 => 0,
                0b01 => {
                    let lead = reader.read_bits(3)? as u32 * 2;
                    let centre = reader.read_bits(6)? as u32;
                    if centre == 0 || lead + centre >= 64 - TRAILING_THRESHOLD {
                        return Err(CompressionError::corrupt(format!(
                            "chimp centre of {} bits after {} leading zeros",
                            centre, lead
                        )));
                    }
                    let trail = 64 - lead - centre;
                    prev_lead = Some(lead);
                    reader.read_bits(centre as u8)? << trail
                }
                0b10 => {
                    let lead = prev_lead
                        .ok_or_else(|| CompressionError::corrupt("leading zero reuse before any value"))?;
                    reader.read_bits((64 - lead) as u8)?
                }
                _ => {
                    let lead = reader.read_bits(3)? as u32 * 2;
                    prev_lead = Some(lead);
                    reader.read_bits((64 - lead) as u8)?
                }
            };
            prev ^= xor;
            dst.push(prev as i64);
        }
        reader.expect_padding_only()
    }
}
