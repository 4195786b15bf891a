//! Sliding-dictionary codec with a PDFCM predictor fallback
//!
//! Each value is described against the last (up to) eight values and a PDFCM
//! predictor, in one of five shapes:
//!
//! ```text
//! 0                                                  repeats the previous value
//! 10   + index(3)                                    equals window[index]
//! 110  + index(3) + tz bytes(3) + len(3) + len bytes  XOR residual against window[index]
//! 1110 + tz bytes(3) + len(3) + len bytes             XOR residual against the prediction
//! 1111 + value(64)                                   exception literal
//! ```
//!
//! `window[j]` is the value `j + 1` positions back. Residuals drop whole zero
//! bytes from both ends. The predictor residual wins ties with the window.
//! Framing: 64-bit first value, 14-bit count.

use super::{check_block, read_window_header, write_window_header, Codec, CodecId, MAX_ITEMS_14};
use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::compression::predictor::{PdfcmPredictor, DEFAULT_TABLE_BITS};
use crate::error::{CompressionError, Result};

/// Values searched by the dictionary
const WINDOW: usize = 8;

/// PDFCM codec
#[derive(Debug, Clone, Copy)]
pub struct PdfcmCodec {
    table_bits: u32,
}

impl PdfcmCodec {
    /// Create a codec with the default predictor table size
    pub fn new() -> Self {
        Self {
            table_bits: DEFAULT_TABLE_BITS,
        }
    }
}

impl Default for PdfcmCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-aligned residual: trailing zero bytes and significant byte count
#[derive(Debug, Clone, Copy)]
struct Residual {
    xor: u64,
    tz_bytes: u32,
    len: u32,
}

impl Residual {
    fn of(xor: u64) -> Self {
        if xor == 0 {
            return Self {
                xor,
                tz_bytes: 0,
                len: 0,
            };
        }
        let lz_bytes = xor.leading_zeros() / 8;
        let tz_bytes = xor.trailing_zeros() / 8;
        Self {
            xor,
            tz_bytes,
            len: 8 - lz_bytes - tz_bytes,
        }
    }

    /// Zero bytes saved
    fn zeros(&self) -> u32 {
        8 - self.len
    }

    fn write(&self, writer: &mut BitWriter<'_>) {
        writer.write_bits(self.tz_bytes as u64, 3);
        writer.write_bits(self.len as u64, 3);
        writer.write_bits(self.xor >> (self.tz_bytes * 8), (self.len * 8) as u8);
    }

    fn read(reader: &mut BitReader<'_>) -> Result<u64> {
        let tz_bytes = reader.read_bits(3)? as u32;
        let len = reader.read_bits(3)? as u32;
        if tz_bytes + len > 8 {
            return Err(CompressionError::corrupt(format!(
                "residual of {} bytes after {} trailing zero bytes exceeds 8 bytes",
                len, tz_bytes
            )));
        }
        let bits = reader.read_bits((len * 8) as u8)?;
        Ok(bits << (tz_bytes * 8))
    }
}

impl Codec for PdfcmCodec {
    fn id(&self) -> CodecId {
        CodecId::Pdfcm
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_ITEMS_14)?;

        let first = values[0];
        let mut writer = BitWriter::new(dst);
        write_window_header(&mut writer, first, values.len());

        let mut predictor = PdfcmPredictor::new(self.table_bits);
        predictor.update(first as u64);

        for i in 1..values.len() {
            let actual = values[i] as u64;
            let prediction = predictor.predict_next();
            predictor.update(actual);

            if values[i] == values[i - 1] {
                writer.write_bit(false);
                continue;
            }

            let window = i.min(WINDOW);
            let mut exact = None;
            let mut best: Option<(usize, Residual)> = None;
            let mut best_zeros = 1;
            for j in 0..window {
                let candidate = values[i - j - 1] as u64;
                if candidate == actual {
                    exact = Some(j);
                    break;
                }
                let residual = Residual::of(actual ^ candidate);
                if residual.zeros() > best_zeros {
                    best_zeros = residual.zeros();
                    best = Some((j, residual));
                }
            }

            if let Some(j) = exact {
                writer.write_bits(0b10, 2);
                writer.write_bits(j as u64, 3);
                continue;
            }

            let predicted = Residual::of(actual ^ prediction);
            if predicted.zeros() >= best_zeros {
                writer.write_bits(0b1110, 4);
                predicted.write(&mut writer);
            } else if let Some((j, residual)) = best {
                writer.write_bits(0b110, 3);
                writer.write_bits(j as u64, 3);
                residual.write(&mut writer);
            } else {
                writer.write_bits(0b1111, 4);
                writer.write_bits(actual, 64);
            }
        }
        writer.finish();
        Ok(first)
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        let mut reader = BitReader::new(src);
        read_window_header(&mut reader, first, count)?;

        let start = dst.len();
        let mut predictor = PdfcmPredictor::new(self.table_bits);
        predictor.update(first as u64);
        dst.push(first);

        for i in 1..count {
            let prediction = predictor.predict_next();
            let decoded = &dst[start..];

            let actual = if !reader.read_bit()? {
                decoded[i - 1] as u64
            } else if !reader.read_bit()? {
                let j = reader.read_bits(3)? as usize;
                window_value(decoded, i, j)?
            } else if !reader.read_bit()? {
                let j = reader.read_bits(3)? as usize;
                window_value(decoded, i, j)? ^ Residual::read(&mut reader)?
            } else if !reader.read_bit()? {
                prediction ^ Residual::read(&mut reader)?
            } else {
                reader.read_bits(64)?
            };

            predictor.update(actual);
            dst.push(actual as i64);
        }
        reader.expect_padding_only()
    }
}

fn window_value(decoded: &[i64], i: usize, j: usize) -> Result<u64> {
    if j >= i.min(WINDOW) {
        return Err(CompressionError::corrupt(format!(
            "dictionary index {} out of range at item {}",
            j, i
        )));
    }
    Ok(decoded[i - j - 1] as u64)
}
