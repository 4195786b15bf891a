//! Error types for block encoding and decoding

use thiserror::Error;

/// Number of leading body bytes rendered into decode error messages
const HEX_PREFIX_LEN: usize = 32;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CompressionError>;

/// Compression errors
#[derive(Error, Debug)]
pub enum CompressionError {
    /// A bit or varint reader ran out of input before satisfying a read
    #[error("Unexpected end of stream: requested {requested} more bits, {remaining} available")]
    EndOfStream {
        /// Bits requested by the read
        requested: usize,
        /// Bits left in the stream
        remaining: usize,
    },

    /// A decoded field is outside its valid range
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// Invalid input handed to an encoder or reader
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A codec was called with no items
    #[error("BUG: {codec} requires at least one item")]
    EmptyBlock {
        /// Codec that rejected the call
        codec: &'static str,
    },

    /// Item count does not fit the codec's count header
    #[error("{codec} cannot encode {items} items; maximum is {max}")]
    BlockTooLarge {
        /// Codec that rejected the block
        codec: &'static str,
        /// Items in the block
        items: usize,
        /// Largest count the header can hold
        max: usize,
    },

    /// Unknown marshal type tag
    #[error("Unknown marshal type: {0}")]
    UnsupportedMarshalType(u8),

    /// Nearest-delta precision outside 1..=64
    #[error("precisionBits must be in the range [1...64]; got {0}")]
    InvalidPrecision(u8),

    /// General-purpose compressor failed to compress
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// General-purpose compressor failed to decompress
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A codec decoder failed; carries the body length and a hex prefix
    #[error("cannot decode {codec} block of {len} bytes (prefix {hex_prefix}): {source}")]
    Decode {
        /// Codec that failed
        codec: &'static str,
        /// Length of the compressed body
        len: usize,
        /// Hex rendering of the first bytes of the body
        hex_prefix: String,
        /// Underlying failure
        #[source]
        source: Box<CompressionError>,
    },
}

impl CompressionError {
    /// Wrap a decoder failure with the codec name and a hex prefix of the body
    pub fn decode(codec: &'static str, src: &[u8], source: CompressionError) -> Self {
        CompressionError::Decode {
            codec,
            len: src.len(),
            hex_prefix: hex_prefix(src),
            source: Box::new(source),
        }
    }

    /// Shorthand for a corrupted-data error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        CompressionError::CorruptedData(msg.into())
    }

    /// Innermost error, skipping `Decode` context wrappers
    pub fn root(&self) -> &CompressionError {
        match self {
            CompressionError::Decode { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the block is truncated or malformed
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.root(),
            CompressionError::EndOfStream { .. }
                | CompressionError::CorruptedData(_)
                | CompressionError::DecompressionFailed(_)
        )
    }

    /// True when a reader ran out of input
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.root(), CompressionError::EndOfStream { .. })
    }
}

/// Render up to `HEX_PREFIX_LEN` bytes as uppercase hex
pub fn hex_prefix(src: &[u8]) -> String {
    use std::fmt::Write;

    let shown = &src[..src.len().min(HEX_PREFIX_LEN)];
    let mut out = String::with_capacity(shown.len() * 2 + 3);
    for byte in shown {
        let _ = write!(out, "{:02X}", byte);
    }
    if src.len() > HEX_PREFIX_LEN {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_prefix_short() {
        assert_eq!(hex_prefix(&[0x0A, 0xFF, 0x00]), "0AFF00");
        assert_eq!(hex_prefix(&[]), "");
    }

    #[test]
    fn test_hex_prefix_truncates() {
        let data = vec![0xABu8; 40];
        let rendered = hex_prefix(&data);
        assert!(rendered.ends_with("..."));
        assert_eq!(rendered.len(), HEX_PREFIX_LEN * 2 + 3);
    }

    #[test]
    fn test_root_unwraps_context() {
        let inner = CompressionError::EndOfStream {
            requested: 6,
            remaining: 2,
        };
        let wrapped = CompressionError::decode("chimp", &[1, 2, 3], inner);
        assert!(wrapped.is_end_of_stream());
        assert!(wrapped.is_corruption());

        let msg = wrapped.to_string();
        assert!(msg.contains("chimp"));
        assert!(msg.contains("010203"));
    }

    #[test]
    fn test_empty_block_is_not_corruption() {
        let err = CompressionError::EmptyBlock { codec: "fpc" };
        assert!(!err.is_corruption());
    }
}
