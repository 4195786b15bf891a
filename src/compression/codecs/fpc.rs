//! FPC dual-predictor codec
//!
//! Two predictors (FCM and DFCM) guess every value. The value is XORed with
//! the guess that leaves more leading zero *bytes* and only the remaining
//! bytes are stored:
//!
//! ```text
//! header: count(14)
//! item:   predictor(1, 1 = DFCM) + zero bytes(3, capped at 7) + (8 - zero bytes) * 8 bits
//! ```
//!
//! Ties go to FCM. Both predictors see every true value, whichever won.
//!
//! # Reference
//!
//! Martin Burtscher and Paruj Ratanaworabhan.
//! "FPC: A High-Speed Compressor for Double-Precision Floating-Point Data."
//! IEEE Transactions on Computers, 2009.

use super::{check_block, check_count, check_first, Codec, CodecId, MAX_ITEMS_14};
use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::compression::predictor::{clamp_table_bits, DfcmPredictor, FcmPredictor, DEFAULT_TABLE_BITS};
use crate::error::Result;

/// FPC codec
#[derive(Debug, Clone, Copy)]
pub struct FpcCodec {
    table_bits: u32,
}

impl FpcCodec {
    /// Create a codec with the default predictor table size
    pub fn new() -> Self {
        Self::with_table_bits(DEFAULT_TABLE_BITS)
    }

    /// Create a codec whose predictor tables hold `1 << table_bits` entries
    ///
    /// Sizes outside `1..=24` are clamped. Encoder and decoder must use the
    /// same size.
    pub fn with_table_bits(table_bits: u32) -> Self {
        Self {
            table_bits: clamp_table_bits(table_bits),
        }
    }
}

impl Default for FpcCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn zero_bytes(xor: u64) -> u32 {
    (xor.leading_zeros() / 8).min(7)
}

impl Codec for FpcCodec {
    fn id(&self) -> CodecId {
        CodecId::Fpc
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_ITEMS_14)?;

        let mut fcm = FcmPredictor::new(self.table_bits);
        let mut dfcm = DfcmPredictor::new(self.table_bits);

        let mut writer = BitWriter::new(dst);
        writer.write_bits(values.len() as u64, 14);

        for &v in values {
            let actual = v as u64;
            let fcm_xor = actual ^ fcm.predict_next();
            let dfcm_xor = actual ^ dfcm.predict_next();

            let (use_dfcm, xor) = if zero_bytes(dfcm_xor) > zero_bytes(fcm_xor) {
                (true, dfcm_xor)
            } else {
                (false, fcm_xor)
            };
            let zeros = zero_bytes(xor);

            writer.write_bit(use_dfcm);
            writer.write_bits(zeros as u64, 3);
            writer.write_bits(xor, ((8 - zeros) * 8) as u8);

            fcm.update(actual);
            dfcm.update(actual);
        }
        writer.finish();
        Ok(values[0])
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        let mut reader = BitReader::new(src);
        check_count(reader.read_bits(14)? as usize, count)?;

        let mut fcm = FcmPredictor::new(self.table_bits);
        let mut dfcm = DfcmPredictor::new(self.table_bits);

        for i in 0..count {
            let use_dfcm = reader.read_bit()?;
            let zeros = reader.read_bits(3)? as u32;
            let xor = reader.read_bits(((8 - zeros) * 8) as u8)?;

            let prediction = if use_dfcm {
                dfcm.predict_next()
            } else {
                fcm.predict_next()
            };
            let actual = prediction ^ xor;
            if i == 0 {
                check_first(actual as i64, first)?;
            }

            fcm.update(actual);
            dfcm.update(actual);
            dst.push(actual as i64);
        }
        reader.expect_padding_only()
    }
}
