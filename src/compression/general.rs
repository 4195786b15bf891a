//! General-purpose byte compressor adapters
//!
//! The selector hands residual varint streams to a byte-oriented compressor
//! as its final stage. Two backends are provided: zstd (bulk API, one frame
//! per block) and lz4 (block format with a prepended little-endian length).
//! Each adapter reports calls and byte totals to an injected observer.

use crate::compression::metrics::{CompressionObserver, NoopObserver};
use crate::error::{hex_prefix, CompressionError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Compression level for a block of `item_count` values
///
/// Small blocks gain little from expensive levels.
pub fn compress_level(item_count: usize) -> i32 {
    match item_count {
        0..=64 => 1,
        65..=256 => 2,
        257..=1024 => 3,
        1025..=4096 => 4,
        _ => 5,
    }
}

/// Byte-stream compressor
pub trait GeneralCompressor: Send + Sync {
    /// Backend name
    fn name(&self) -> &'static str;

    /// Compress `src` at `level` (ignored by backends without levels)
    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>>;

    /// Decompress a body produced by [`GeneralCompressor::compress`]
    fn decompress(&self, src: &[u8]) -> Result<Vec<u8>>;
}

/// Available backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// zstd
    #[default]
    Zstd,
    /// lz4 block format
    Lz4,
}

impl BackendKind {
    /// Backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Zstd => "zstd",
            BackendKind::Lz4 => "lz4",
        }
    }

    /// Build the adapter reporting to `observer`
    pub fn build(&self, observer: Arc<dyn CompressionObserver>) -> Arc<dyn GeneralCompressor> {
        match self {
            BackendKind::Zstd => Arc::new(ZstdCompressor::new(observer)),
            BackendKind::Lz4 => Arc::new(Lz4Compressor::new(observer)),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(BackendKind::Zstd),
            "lz4" => Ok(BackendKind::Lz4),
            other => Err(CompressionError::Configuration(format!(
                "unknown backend '{}'; expected zstd or lz4",
                other
            ))),
        }
    }
}

/// zstd adapter
pub struct ZstdCompressor {
    observer: Arc<dyn CompressionObserver>,
}

impl ZstdCompressor {
    /// Create an adapter reporting to `observer`
    pub fn new(observer: Arc<dyn CompressionObserver>) -> Self {
        Self { observer }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

impl GeneralCompressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        self.observer.incr_compress_calls();
        self.observer.add_original_bytes(src.len());

        let compressed = zstd::bulk::compress(src, level).map_err(|e| {
            self.observer.incr_compress_errors();
            CompressionError::CompressionFailed(format!("zstd level {}: {}", level, e))
        })?;

        self.observer.add_compressed_bytes(compressed.len());
        trace!(level, original = src.len(), compressed = compressed.len(), "zstd block");
        Ok(compressed)
    }

    fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
        self.observer.incr_decompress_calls();
        zstd::decode_all(src).map_err(|e| {
            self.observer.incr_decompress_errors();
            CompressionError::DecompressionFailed(format!(
                "cannot decompress zstd block with len={}: {}; block data (hex): {}",
                src.len(),
                e,
                hex_prefix(src)
            ))
        })
    }
}

/// lz4 adapter
pub struct Lz4Compressor {
    observer: Arc<dyn CompressionObserver>,
}

impl Lz4Compressor {
    /// Create an adapter reporting to `observer`
    pub fn new(observer: Arc<dyn CompressionObserver>) -> Self {
        Self { observer }
    }

    fn fail(&self, src: &[u8], reason: impl std::fmt::Display) -> CompressionError {
        self.observer.incr_decompress_errors();
        CompressionError::DecompressionFailed(format!(
            "cannot decompress lz4 block with len={}: {}; block data (hex): {}",
            src.len(),
            reason,
            hex_prefix(src)
        ))
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

/// Largest expansion an lz4 block can achieve
const LZ4_MAX_RATIO: usize = 255;

impl GeneralCompressor for Lz4Compressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, src: &[u8], _level: i32) -> Result<Vec<u8>> {
        self.observer.incr_compress_calls();
        self.observer.add_original_bytes(src.len());

        let compressed = lz4_flex::compress_prepend_size(src);

        self.observer.add_compressed_bytes(compressed.len());
        trace!(original = src.len(), compressed = compressed.len(), "lz4 block");
        Ok(compressed)
    }

    fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
        self.observer.incr_decompress_calls();

        if src.len() < 4 {
            return Err(self.fail(src, "missing length prefix"));
        }
        let expected = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        // Reject absurd length prefixes before allocating
        if expected > (src.len() - 4).saturating_mul(LZ4_MAX_RATIO) + 16 {
            return Err(self.fail(src, format!("length prefix {} too large", expected)));
        }

        let raw = lz4_flex::decompress_size_prepended(src).map_err(|e| self.fail(src, e))?;
        if raw.len() != expected {
            return Err(self.fail(src, format!("decoded {} bytes, expected {}", raw.len(), expected)));
        }
        Ok(raw)
    }
}
