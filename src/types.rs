//! Core data types shared by the encoder and its callers
//!
//! # Key Types
//!
//! - **`MarshalType`**: Tag naming the scheme that produced a block body
//! - **`EncodedBlock`**: A body plus the tag, first value and item count that
//!   the caller must persist to decode it
//!
//! # Example
//!
//! ```rust
//! use sac_encoding::types::MarshalType;
//!
//! let mt = MarshalType::from_byte(3).unwrap();
//! assert_eq!(mt, MarshalType::Const);
//! assert_eq!(mt.as_byte(), 3);
//! assert_eq!(mt.name(), "const");
//! ```

use crate::error::{CompressionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest block any tag or codec will encode or decode
///
/// Matches the widest count header (16 bits). Decoders reject larger counts
/// before allocating, so corrupt metadata cannot request unbounded output.
pub const MAX_BLOCK_ITEMS: usize = u16::MAX as usize;

/// Scheme used for one block
///
/// The byte value is what callers persist next to the body; it never changes
/// for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MarshalType {
    /// Second-order nearest delta, then a general compressor
    ZstdNearestDelta2 = 1,
    /// Two-point line: one varint delta
    DeltaConst = 2,
    /// Every value equals the first; empty body
    Const = 3,
    /// First-order nearest delta, then a general compressor
    ZstdNearestDelta = 4,
    /// Run-length pairs
    RepeatEliminate = 7,
    /// Plain varints, then a general compressor
    Zstd = 8,
}

impl MarshalType {
    /// Number of variants
    pub const COUNT: usize = 6;

    /// All variants, in a fixed order used for metrics
    pub const ALL: [MarshalType; Self::COUNT] = [
        MarshalType::Const,
        MarshalType::DeltaConst,
        MarshalType::RepeatEliminate,
        MarshalType::ZstdNearestDelta2,
        MarshalType::ZstdNearestDelta,
        MarshalType::Zstd,
    ];

    /// Parse a persisted tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MarshalType::ZstdNearestDelta2),
            2 => Some(MarshalType::DeltaConst),
            3 => Some(MarshalType::Const),
            4 => Some(MarshalType::ZstdNearestDelta),
            7 => Some(MarshalType::RepeatEliminate),
            8 => Some(MarshalType::Zstd),
            _ => None,
        }
    }

    /// Tag byte to persist
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Stable lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            MarshalType::Const => "const",
            MarshalType::DeltaConst => "delta_const",
            MarshalType::RepeatEliminate => "repeat_eliminate",
            MarshalType::ZstdNearestDelta2 => "zstd_nearest_delta2",
            MarshalType::ZstdNearestDelta => "zstd_nearest_delta",
            MarshalType::Zstd => "zstd",
        }
    }

    /// Position in [`MarshalType::ALL`]
    pub fn index(&self) -> usize {
        match self {
            MarshalType::Const => 0,
            MarshalType::DeltaConst => 1,
            MarshalType::RepeatEliminate => 2,
            MarshalType::ZstdNearestDelta2 => 3,
            MarshalType::ZstdNearestDelta => 4,
            MarshalType::Zstd => 5,
        }
    }

    /// Whether the body passes through the general-purpose compressor
    pub fn uses_backend(&self) -> bool {
        matches!(
            self,
            MarshalType::ZstdNearestDelta2 | MarshalType::ZstdNearestDelta | MarshalType::Zstd
        )
    }
}

impl TryFrom<u8> for MarshalType {
    type Error = CompressionError;

    fn try_from(byte: u8) -> Result<Self> {
        Self::from_byte(byte).ok_or(CompressionError::UnsupportedMarshalType(byte))
    }
}

impl fmt::Display for MarshalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A marshaled block and the metadata needed to decode it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBlock {
    /// Scheme that produced `body`
    pub marshal_type: MarshalType,
    /// First value of the block, stored verbatim
    pub first_value: i64,
    /// Number of values in the block
    pub item_count: usize,
    /// Scheme-specific body
    pub body: Vec<u8>,
}

impl EncodedBlock {
    /// Bytes a caller would persist: body, tag, first value and count
    pub fn encoded_size(&self) -> usize {
        self.body.len() + 1 + 8 + 4
    }

    /// Raw size over encoded size
    pub fn compression_ratio(&self) -> f64 {
        (self.item_count * 8) as f64 / self.encoded_size() as f64
    }
}
