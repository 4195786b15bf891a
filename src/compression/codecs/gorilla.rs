//! Gorilla-family XOR codecs
//!
//! Each value after the first is XORed with its predecessor. A zero XOR is a
//! single `0` bit; otherwise the meaningful bits between the leading and
//! trailing zeros are written, reusing the previous window when they fit.
//!
//! The three layouts share framing (64-bit first value, 14-bit count) and the
//! encode/decode loop, and differ only in how windows are described:
//!
//! ```text
//! Classic:     0 | 10 + bits | 11 + lz(5, clamped to 31) + width(6) + bits
//! GorillaZ:    0 | 10 + bits | 11 + lz bytes(3) + width(6) + bits
//! GorillaPlus: 0 | 100 + bits | 101 + tz(6) + bits (previous width, new offset)
//!                             | 11 + lz(6) + width(6) + bits
//! ```
//!
//! A width of 64 is stored as 0.

use super::{check_block, read_window_header, write_window_header, Codec, CodecId, MAX_ITEMS_14};
use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::error::{CompressionError, Result};

/// Window header layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GorillaLayout {
    /// 5-bit leading zeros, 6-bit width
    Classic,
    /// Leading zeros rounded down to whole bytes, 3-bit byte count, 6-bit width
    GorillaZ,
    /// 6-bit leading zeros, 6-bit width, plus a shifted-reuse case
    GorillaPlus,
}

/// Meaningful-bit window: leading zeros and width
#[derive(Debug, Clone, Copy)]
struct Window {
    leading: u32,
    width: u32,
}

impl Window {
    #[inline]
    fn trailing(&self) -> u32 {
        64 - self.leading - self.width
    }
}

/// XOR codec parameterized by window layout
#[derive(Debug, Clone, Copy)]
pub struct GorillaCodec {
    layout: GorillaLayout,
}

impl GorillaCodec {
    /// Create a codec using `layout`
    pub fn new(layout: GorillaLayout) -> Self {
        Self { layout }
    }

    /// Window layout in use
    pub fn layout(&self) -> GorillaLayout {
        self.layout
    }

    /// Encode a non-zero XOR; the `1` change flag is already written
    fn encode_xor(&self, writer: &mut BitWriter<'_>, xor: u64, window: &mut Option<Window>) {
        let lz = xor.leading_zeros();
        let tz = xor.trailing_zeros();

        if let Some(prev) = *window {
            if lz >= prev.leading && tz >= prev.trailing() {
                match self.layout {
                    GorillaLayout::GorillaPlus => writer.write_bits(0b00, 2),
                    _ => writer.write_bit(false),
                }
                writer.write_bits(xor >> prev.trailing(), prev.width as u8);
                return;
            }

            // Same width fits at a new offset
            if self.layout == GorillaLayout::GorillaPlus
                && tz >= prev.trailing()
                && lz + tz >= prev.leading + prev.trailing()
            {
                writer.write_bits(0b01, 2);
                writer.write_bits(tz as u64, 6);
                writer.write_bits(xor >> tz, prev.width as u8);
                return;
            }
        }

        let leading = match self.layout {
            GorillaLayout::Classic => lz.min(31),
            GorillaLayout::GorillaZ => (lz / 8) * 8,
            GorillaLayout::GorillaPlus => lz,
        };
        let width = 64 - leading - tz;

        writer.write_bit(true);
        match self.layout {
            GorillaLayout::Classic => writer.write_bits(leading as u64, 5),
            GorillaLayout::GorillaZ => writer.write_bits((leading / 8) as u64, 3),
            GorillaLayout::GorillaPlus => writer.write_bits(leading as u64, 6),
        }
        writer.write_bits((width & 63) as u64, 6);
        writer.write_bits(xor >> tz, width as u8);

        *window = Some(Window { leading, width });
    }

    /// Decode the XOR following a `1` change flag
    fn decode_xor(&self, reader: &mut BitReader<'_>, window: &mut Option<Window>) -> Result<u64> {
        let new_window = match self.layout {
            GorillaLayout::GorillaPlus => {
                if reader.read_bit()? {
                    true
                } else if reader.read_bit()? {
                    // Previous width at an explicit offset; the window is kept
                    let prev = window.ok_or_else(|| CompressionError::corrupt("window reuse before any window"))?;
                    let tz = reader.read_bits(6)? as u32;
                    if tz + prev.width > 64 {
                        return Err(CompressionError::corrupt(format!(
                            "shifted window of {} bits at offset {} exceeds 64 bits",
                            prev.width, tz
                        )));
                    }
                    let bits = reader.read_bits(prev.width as u8)?;
                    return Ok(bits << tz);
                } else {
                    false
                }
            }
            _ => reader.read_bit()?,
        };

        if !new_window {
            let prev = window.ok_or_else(|| CompressionError::corrupt("window reuse before any window"))?;
            let bits = reader.read_bits(prev.width as u8)?;
            return Ok(bits << prev.trailing());
        }

        let leading = match self.layout {
            GorillaLayout::Classic => reader.read_bits(5)? as u32,
            GorillaLayout::GorillaZ => reader.read_bits(3)? as u32 * 8,
            GorillaLayout::GorillaPlus => reader.read_bits(6)? as u32,
        };
        let width = match reader.read_bits(6)? as u32 {
            0 => 64,
            w => w,
        };
        if leading + width > 64 {
            return Err(CompressionError::corrupt(format!(
                "window of {} leading zeros and {} bits exceeds 64 bits",
                leading, width
            )));
        }

        let current = Window { leading, width };
        let bits = reader.read_bits(width as u8)?;
        *window = Some(current);
        Ok(bits << current.trailing())
    }
}

impl Codec for GorillaCodec {
    fn id(&self) -> CodecId {
        match self.layout {
            GorillaLayout::Classic => CodecId::Gorilla,
            GorillaLayout::GorillaZ => CodecId::GorillaZ,
            GorillaLayout::GorillaPlus => CodecId::GorillaPlus,
        }
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_ITEMS_14)?;

        let first = values[0];
        let mut writer = BitWriter::new(dst);
        write_window_header(&mut writer, first, values.len());

        let mut prev = first as u64;
        let mut window = None;
        for &v in &values[1..] {
            let xor = prev ^ v as u64;
            if xor == 0 {
                writer.write_bit(false);
            } else {
                writer.write_bit(true);
                self.encode_xor(&mut writer, xor, &mut window);
            }
            prev = v as u64;
        }
        writer.finish();
        Ok(first)
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        let mut reader = BitReader::new(src);
        read_window_header(&mut reader, first, count)?;

        let mut prev = first as u64;
        let mut window = None;
        dst.push(first);
        for _ in 1..count {
            let xor = if reader.read_bit()? {
                self.decode_xor(&mut reader, &mut window)?
            } else {
                0
            };
            prev ^= xor;
            dst.push(prev as i64);
        }
        reader.expect_padding_only()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_data;
    use super::*;

    const LAYOUTS: [GorillaLayout; 3] = [
        GorillaLayout::Classic,
        GorillaLayout::GorillaZ,
        GorillaLayout::GorillaPlus,
    ];

    fn roundtrip(layout: GorillaLayout, values: &[i64]) -> Vec<u8> {
        let codec = GorillaCodec::new(layout);
        let (body, first) = codec.compress(values).unwrap();
        let decoded = codec.decompress(&body, first, values.len()).unwrap();
        assert_eq!(decoded, values, "{:?}", layout);
        body
    }

    #[test]
    fn test_counter_then_zero() {
        let values = [1, 2, 3, 4, 5, 6, 7, 8, 9, 0];
        for layout in LAYOUTS {
            roundtrip(layout, &values);
        }
    }

    #[test]
    fn test_single_value_is_header_only() {
        for layout in LAYOUTS {
            let body = roundtrip(layout, &[i64::MIN]);
            // 64 + 14 bits
            assert_eq!(body.len(), 10);
        }
    }

    #[test]
    fn test_constant_block_costs_one_bit_per_value() {
        let values = vec![0x4059_0000_0000_0000i64; 801];
        for layout in LAYOUTS {
            let body = roundtrip(layout, &values);
            assert_eq!(body.len(), 10 + 100);
        }
    }

    #[test]
    fn test_full_width_xor() {
        // XOR with both the top and bottom bit set needs a 64-bit window
        let values = [0, i64::MIN | 1, 0, -1, 0];
        for layout in LAYOUTS {
            roundtrip(layout, &values);
        }
    }

    #[test]
    fn test_float_series_compresses() {
        let values = test_data::floats(1000);
        for layout in LAYOUTS {
            let body = roundtrip(layout, &values);
            assert!(body.len() < values.len() * 8, "{:?} did not compress", layout);
        }
    }

    #[test]
    fn test_gorilla_plus_shifted_reuse() {
        // Same 4-bit pattern sliding down: window width stays, offset moves
        let values = [0, 0xF000, 0xF000 ^ 0x0F00, 0xF000 ^ 0x0F00 ^ 0x00F0, 0];
        roundtrip(GorillaLayout::GorillaPlus, &values);
    }

    #[test]
    fn test_classic_control_bits() {
        // Header 78 bits; 1 -> '1' '1' lz(5) width(6) + 33 bits;
        // then two window reuses '1' '0' + 33 bits each
        let values = [0, 1, 0, 1];
        let body = roundtrip(GorillaLayout::Classic, &values);
        assert_eq!(body.len(), (78 + 46 + 35 + 35 + 7) / 8);

        let mut expected = Vec::new();
        let mut writer = BitWriter::new(&mut expected);
        write_window_header(&mut writer, 0, 4);
        writer.write_bits(0b11, 2);
        writer.write_bits(31, 5);
        writer.write_bits(33, 6);
        writer.write_bits(1, 33);
        for _ in 0..2 {
            writer.write_bits(0b10, 2);
            writer.write_bits(1, 33);
        }
        writer.finish();
        assert_eq!(body, expected);
    }

    #[test]
    fn test_gorilla_plus_control_bits() {
        // 0x0F opens a 4-bit window at offset 0; 0xF0 has the same width one
        // nibble up, so it reuses the width at a new offset
        let values = [0, 0x0F, 0x0F ^ 0xF0, 0x0F];
        let body = roundtrip(GorillaLayout::GorillaPlus, &values);

        let mut expected = Vec::new();
        let mut writer = BitWriter::new(&mut expected);
        write_window_header(&mut writer, 0, 4);
        writer.write_bits(0b11, 2);
        writer.write_bits(60, 6);
        writer.write_bits(4, 6);
        writer.write_bits(0xF, 4);
        for _ in 0..2 {
            writer.write_bits(0b101, 3);
            writer.write_bits(4, 6);
            writer.write_bits(0xF, 4);
        }
        writer.finish();
        assert_eq!(body, expected);
    }

    #[test]
    fn test_layouts_are_not_interchangeable() {
        let values = test_data::floats(200);
        let (body, first) = GorillaCodec::new(GorillaLayout::GorillaPlus).compress(&values).unwrap();
        let decoded = GorillaCodec::new(GorillaLayout::Classic).decompress(&body, first, values.len());
        assert!(decoded.map(|d| d != values).unwrap_or(true));
    }

    #[test]
    fn test_corrupt_window_rejected() {
        // Header, then '1' '11' + leading 31 + width 63 (31 + 63 > 64)
        let mut body = Vec::new();
        let mut writer = BitWriter::new(&mut body);
        write_window_header(&mut writer, 0, 2);
        writer.write_bits(0b11, 2);
        writer.write_bits(31, 5);
        writer.write_bits(63, 6);
        writer.write_bits(0, 63);
        writer.finish();

        let err = GorillaCodec::new(GorillaLayout::Classic).decompress(&body, 0, 2).unwrap_err();
        assert!(err.is_corruption());
        assert!(!err.is_end_of_stream());
    }

    #[test]
    fn test_reuse_without_window_rejected() {
        let mut body = Vec::new();
        let mut writer = BitWriter::new(&mut body);
        write_window_header(&mut writer, 0, 2);
        writer.write_bits(0b10, 2);
        writer.finish();

        let err = GorillaCodec::new(GorillaLayout::GorillaZ).decompress(&body, 0, 2).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_header_mismatch_rejected() {
        let codec = GorillaCodec::new(GorillaLayout::Classic);
        let (body, first) = codec.compress(&[10, 11, 12]).unwrap();
        assert!(codec.decompress(&body, first, 2).is_err());
        assert!(codec.decompress(&body, first + 1, 3).is_err());
    }

    #[test]
    fn test_block_too_large() {
        let values = vec![0i64; MAX_ITEMS_14 + 1];
        let err = GorillaCodec::new(GorillaLayout::Classic).compress(&values).unwrap_err();
        assert!(matches!(err, CompressionError::BlockTooLarge { max: MAX_ITEMS_14, .. }));
    }
}
