//! sac-encoding - self-adaptive block compression for 64-bit integer samples
//!
//! This library classifies each block of samples by cheap statistics and
//! encodes it with the scheme that suits its shape:
//! - Constant and two-point blocks with no body beyond the first value
//! - Run-length elimination for mostly repeating blocks
//! - Precision-bounded nearest-delta residuals under zstd or lz4
//! - A family of bit-packed XOR and predictor codecs (Gorilla, Chimp, FPC,
//!   PDFCM, Huffman, TSXor) and varint delta codecs for direct use
//!
//! The caller persists the [`MarshalType`] tag, first value and item count
//! next to each body; decoding dispatches on the tag alone.
//!
//! # Example
//!
//! ```rust
//! use sac_encoding::{AdaptiveEncoder, MarshalType};
//!
//! let encoder = AdaptiveEncoder::default();
//! let values: Vec<i64> = (0..1000).map(|i| 1_700_000_000_000 + i * 1_000).collect();
//!
//! let block = encoder.marshal(&values).unwrap();
//! assert_eq!(block.marshal_type, MarshalType::ZstdNearestDelta);
//! assert_eq!(encoder.unmarshal(&block).unwrap(), values);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compression;
pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use compression::selector::{get_marshal_type, AdaptiveEncoder};
pub use config::EncodingConfig;
pub use error::{CompressionError, Result};
pub use types::{EncodedBlock, MarshalType, MAX_BLOCK_ITEMS};
