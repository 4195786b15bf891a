//! Codec trait and the exact integer codec family
//!
//! Every codec turns a non-empty block of `i64` values into an opaque body
//! and back. The body is only decodable by the codec that produced it; the
//! caller stores the first value and item count out of band.
//!
//! Decoders append to a caller-supplied vector. On failure the vector is
//! truncated back to its original length, so an existing prefix is never left
//! with partial output.

mod chimp;
mod delta;
mod fpc;
mod gorilla;
mod huffman;
mod pdfcm;
mod repeat;
mod tsxor;

pub use chimp::ChimpCodec;
pub use delta::{DeltaCodec, DeltaKind};
pub use fpc::FpcCodec;
pub use gorilla::{GorillaCodec, GorillaLayout};
pub use huffman::HuffmanCodec;
pub use pdfcm::PdfcmCodec;
pub use repeat::RepeatEliminateCodec;
pub use tsxor::TsXorCodec;

use crate::compression::bit_stream::{BitReader, BitWriter};
use crate::error::{CompressionError, Result};
use crate::types::MAX_BLOCK_ITEMS;

/// Largest block a 14-bit count header can describe
pub const MAX_ITEMS_14: usize = (1 << 14) - 1;

/// Largest block a 16-bit count header can describe
pub const MAX_ITEMS_16: usize = MAX_BLOCK_ITEMS;

/// Codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecId {
    /// Classic Gorilla XOR layout
    Gorilla = 0,
    /// Gorilla with byte-granular leading zeros
    GorillaZ = 1,
    /// Gorilla with shifted window reuse
    GorillaPlus = 2,
    /// Chimp XOR codec
    Chimp = 3,
    /// FCM/DFCM dual predictor
    Fpc = 4,
    /// Sliding dictionary plus PDFCM predictor
    Pdfcm = 5,
    /// First-order delta varints
    Delta = 6,
    /// Second-order delta varints
    Delta2 = 7,
    /// Delta of consecutive XORs
    XorDelta = 8,
    /// Running XOR of consecutive deltas
    DeltaXor = 9,
    /// Run-length pairs
    RepeatEliminate = 10,
    /// Static nibble Huffman
    Huffman = 11,
    /// 127-entry sliding dictionary with byte-aligned XOR residuals
    TsXor = 12,
}

impl CodecId {
    /// All codec ids in tag order
    pub const ALL: [CodecId; 13] = [
        CodecId::Gorilla,
        CodecId::GorillaZ,
        CodecId::GorillaPlus,
        CodecId::Chimp,
        CodecId::Fpc,
        CodecId::Pdfcm,
        CodecId::Delta,
        CodecId::Delta2,
        CodecId::XorDelta,
        CodecId::DeltaXor,
        CodecId::RepeatEliminate,
        CodecId::Huffman,
        CodecId::TsXor,
    ];

    /// Convert a byte to a CodecId
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Get the name of the codec
    pub fn name(&self) -> &'static str {
        match self {
            CodecId::Gorilla => "gorilla",
            CodecId::GorillaZ => "gorillaz",
            CodecId::GorillaPlus => "gorilla_plus",
            CodecId::Chimp => "chimp",
            CodecId::Fpc => "fpc",
            CodecId::Pdfcm => "pdfcm",
            CodecId::Delta => "delta",
            CodecId::Delta2 => "delta2",
            CodecId::XorDelta => "xor_delta",
            CodecId::DeltaXor => "delta_xor",
            CodecId::RepeatEliminate => "repeat_eliminate",
            CodecId::Huffman => "huffman",
            CodecId::TsXor => "tsxor",
        }
    }

    /// Instantiate the codec with default settings
    pub fn codec(&self) -> Box<dyn Codec> {
        match self {
            CodecId::Gorilla => Box::new(GorillaCodec::new(GorillaLayout::Classic)),
            CodecId::GorillaZ => Box::new(GorillaCodec::new(GorillaLayout::GorillaZ)),
            CodecId::GorillaPlus => Box::new(GorillaCodec::new(GorillaLayout::GorillaPlus)),
            CodecId::Chimp => Box::new(ChimpCodec::new()),
            CodecId::Fpc => Box::new(FpcCodec::new()),
            CodecId::Pdfcm => Box::new(PdfcmCodec::new()),
            CodecId::Delta => Box::new(DeltaCodec::new(DeltaKind::Delta)),
            CodecId::Delta2 => Box::new(DeltaCodec::new(DeltaKind::Delta2)),
            CodecId::XorDelta => Box::new(DeltaCodec::new(DeltaKind::XorDelta)),
            CodecId::DeltaXor => Box::new(DeltaCodec::new(DeltaKind::DeltaXor)),
            CodecId::RepeatEliminate => Box::new(RepeatEliminateCodec::default()),
            CodecId::Huffman => Box::new(HuffmanCodec::new()),
            CodecId::TsXor => Box::new(TsXorCodec::new()),
        }
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every codec with default settings, in tag order
pub fn all_codecs() -> Vec<Box<dyn Codec>> {
    CodecId::ALL.iter().map(|id| id.codec()).collect()
}

/// Trait for all exact integer codecs
///
/// Implementations must be thread-safe (`Send + Sync`); any predictor or
/// window state lives on the stack of a single call.
pub trait Codec: Send + Sync {
    /// Get the unique identifier for this codec
    fn id(&self) -> CodecId;

    /// Append the compressed body of `values` to `dst`
    ///
    /// Returns the block's first value, which the caller stores alongside the
    /// body. Fails with `EmptyBlock` for an empty slice.
    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64>;

    /// Decode exactly `count` values from `src`, appending them to `dst`
    ///
    /// Callers guarantee `1 <= count <= MAX_BLOCK_ITEMS`. Implementations may
    /// leave partial output behind on error; [`Codec::decompress_into`] checks
    /// the count and is the rollback-safe entry point.
    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()>;

    /// Get the codec name
    fn name(&self) -> &'static str {
        self.id().name()
    }

    /// Compress into a fresh buffer, returning `(body, first_value)`
    fn compress(&self, values: &[i64]) -> Result<(Vec<u8>, i64)> {
        let mut body = Vec::new();
        let first = self.compress_into(&mut body, values)?;
        Ok((body, first))
    }

    /// Append `count` decoded values to `dst`, preserving its prefix on error
    fn decompress_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        if count == 0 {
            return Err(CompressionError::EmptyBlock { codec: self.name() });
        }
        if count > MAX_BLOCK_ITEMS {
            return Err(CompressionError::decode(
                self.name(),
                src,
                CompressionError::corrupt(format!("item count {} exceeds {}", count, MAX_BLOCK_ITEMS)),
            ));
        }

        let start = dst.len();
        dst.reserve(count);
        let outcome = self.decode_into(dst, src, first, count).and_then(|()| {
            let decoded = dst.len() - start;
            if decoded != count {
                return Err(CompressionError::corrupt(format!(
                    "decoded {} items, expected {}",
                    decoded, count
                )));
            }
            Ok(())
        });

        outcome.map_err(|err| {
            dst.truncate(start);
            CompressionError::decode(self.name(), src, err)
        })
    }

    /// Decode into a fresh vector
    fn decompress(&self, src: &[u8], first: i64, count: usize) -> Result<Vec<i64>> {
        let mut out = Vec::with_capacity(count.min(MAX_BLOCK_ITEMS));
        self.decompress_into(&mut out, src, first, count)?;
        Ok(out)
    }
}

/// Reject empty blocks and blocks too large for the count header
pub(crate) fn check_block(codec: &'static str, items: usize, max: usize) -> Result<()> {
    if items == 0 {
        return Err(CompressionError::EmptyBlock { codec });
    }
    if items > max {
        return Err(CompressionError::BlockTooLarge { codec, items, max });
    }
    Ok(())
}

/// Write the first-value + 14-bit count header of the window codecs
pub(crate) fn write_window_header(writer: &mut BitWriter<'_>, first: i64, count: usize) {
    writer.write_bits(first as u64, 64);
    writer.write_bits(count as u64, 14);
}

/// Read and verify the first-value + 14-bit count header
pub(crate) fn read_window_header(reader: &mut BitReader<'_>, first: i64, count: usize) -> Result<()> {
    let stored_first = reader.read_bits(64)? as i64;
    let stored_count = reader.read_bits(14)? as usize;
    check_count(stored_count, count)?;
    if stored_first != first {
        return Err(CompressionError::corrupt(format!(
            "first value mismatch: header has {}, caller supplied {}",
            stored_first, first
        )));
    }
    Ok(())
}

/// Verify a stored item count against the requested one
pub(crate) fn check_count(stored: usize, requested: usize) -> Result<()> {
    if stored != requested {
        return Err(CompressionError::corrupt(format!(
            "item count mismatch: header has {}, caller requested {}",
            stored, requested
        )));
    }
    Ok(())
}

/// Verify that a codec without a stored first value decoded the expected one
pub(crate) fn check_first(decoded: i64, first: i64) -> Result<()> {
    if decoded != first {
        return Err(CompressionError::corrupt(format!(
            "first decoded value {} does not match first value {}",
            decoded, first
        )));
    }
    Ok(())
}
