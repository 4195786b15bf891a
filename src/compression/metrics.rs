//! Compression metrics and observability
//!
//! Codecs and general-purpose compressor adapters report through the
//! [`CompressionObserver`] port instead of process-wide statics, so callers
//! choose where the numbers go. [`CodecMetrics`] is the atomic implementation
//! used by the encoder; tests can pass [`NoopObserver`] or their own recorder.
//!
//! # Example
//!
//! ```rust
//! use sac_encoding::compression::metrics::{CompressionObserver, EncodingMetrics};
//!
//! let metrics = EncodingMetrics::new();
//! metrics.zstd.incr_compress_calls();
//! metrics.zstd.add_original_bytes(8192);
//! metrics.zstd.add_compressed_bytes(1024);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.zstd.compression_ratio(), 8.0);
//! assert!(metrics.to_prometheus().contains("sac_zstd_block_compress_calls_total 1"));
//! ```

use crate::types::MarshalType;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observability port for compression calls
///
/// Every method must be cheap and must never fail.
pub trait CompressionObserver: Send + Sync {
    /// One compress call started
    fn incr_compress_calls(&self);
    /// One decompress call started
    fn incr_decompress_calls(&self);
    /// Bytes handed to a compress call
    fn add_original_bytes(&self, n: usize);
    /// Bytes produced by a compress call
    fn add_compressed_bytes(&self, n: usize);
    /// A compress call failed
    fn incr_compress_errors(&self) {}
    /// A decompress call failed
    fn incr_decompress_errors(&self) {}
}

/// Observer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CompressionObserver for NoopObserver {
    fn incr_compress_calls(&self) {}
    fn incr_decompress_calls(&self) {}
    fn add_original_bytes(&self, _n: usize) {}
    fn add_compressed_bytes(&self, _n: usize) {}
}

/// Atomic counters for a single compressor
#[derive(Debug, Default)]
pub struct CodecMetrics {
    /// Total compression operations
    pub compress_calls: AtomicU64,
    /// Total decompression operations
    pub decompress_calls: AtomicU64,
    /// Total bytes before compression
    pub original_bytes: AtomicU64,
    /// Total bytes after compression
    pub compressed_bytes: AtomicU64,
    /// Total compression errors
    pub compress_errors: AtomicU64,
    /// Total decompression errors
    pub decompress_errors: AtomicU64,
}

impl CodecMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot of current metrics
    pub fn snapshot(&self) -> CodecMetricsSnapshot {
        CodecMetricsSnapshot {
            compress_calls: self.compress_calls.load(Ordering::Relaxed),
            decompress_calls: self.decompress_calls.load(Ordering::Relaxed),
            original_bytes: self.original_bytes.load(Ordering::Relaxed),
            compressed_bytes: self.compressed_bytes.load(Ordering::Relaxed),
            compress_errors: self.compress_errors.load(Ordering::Relaxed),
            decompress_errors: self.decompress_errors.load(Ordering::Relaxed),
        }
    }
}

impl CompressionObserver for CodecMetrics {
    fn incr_compress_calls(&self) {
        self.compress_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_decompress_calls(&self) {
        self.decompress_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn add_original_bytes(&self, n: usize) {
        self.original_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_compressed_bytes(&self, n: usize) {
        self.compressed_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn incr_compress_errors(&self) {
        self.compress_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_decompress_errors(&self) {
        self.decompress_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Non-atomic snapshot of codec metrics for serialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CodecMetricsSnapshot {
    /// Total compression operations
    pub compress_calls: u64,
    /// Total decompression operations
    pub decompress_calls: u64,
    /// Total bytes before compression
    pub original_bytes: u64,
    /// Total bytes after compression
    pub compressed_bytes: u64,
    /// Total compression errors
    pub compress_errors: u64,
    /// Total decompression errors
    pub decompress_errors: u64,
}

impl CodecMetricsSnapshot {
    /// Get compression ratio
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            0.0
        } else {
            self.original_bytes as f64 / self.compressed_bytes as f64
        }
    }
}

/// Per-encoder metrics: one counter set per compressor plus tag selections
#[derive(Debug)]
pub struct EncodingMetrics {
    /// zstd adapter
    pub zstd: Arc<CodecMetrics>,
    /// lz4 adapter
    pub lz4: Arc<CodecMetrics>,
    /// Repeat-elimination codec
    pub repeat_eliminate: Arc<CodecMetrics>,
    /// Blocks marshaled per tag, indexed by `MarshalType::index`
    selected: [AtomicU64; MarshalType::COUNT],
    /// Block decode failures
    unmarshal_errors: AtomicU64,
}

impl EncodingMetrics {
    /// Create a zeroed metrics set
    pub fn new() -> Self {
        Self {
            zstd: Arc::new(CodecMetrics::new()),
            lz4: Arc::new(CodecMetrics::new()),
            repeat_eliminate: Arc::new(CodecMetrics::new()),
            selected: Default::default(),
            unmarshal_errors: AtomicU64::new(0),
        }
    }

    /// Count one block marshaled as `mt`
    pub fn record_selection(&self, mt: MarshalType) {
        self.selected[mt.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Count one block that failed to decode
    pub fn record_unmarshal_error(&self) {
        self.unmarshal_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Blocks marshaled as `mt` so far
    pub fn selections(&self, mt: MarshalType) -> u64 {
        self.selected[mt.index()].load(Ordering::Relaxed)
    }

    /// Create a full snapshot of all metrics
    pub fn snapshot(&self) -> EncodingMetricsSnapshot {
        let selections = MarshalType::ALL
            .iter()
            .map(|mt| (mt.name().to_string(), self.selections(*mt)))
            .collect();

        EncodingMetricsSnapshot {
            zstd: self.zstd.snapshot(),
            lz4: self.lz4.snapshot(),
            repeat_eliminate: self.repeat_eliminate.snapshot(),
            selections,
            unmarshal_errors: self.unmarshal_errors.load(Ordering::Relaxed),
        }
    }

    /// Format as Prometheus metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        for (name, metrics) in [
            ("zstd", &snapshot.zstd),
            ("lz4", &snapshot.lz4),
            ("re", &snapshot.repeat_eliminate),
        ] {
            push_counter(&mut output, name, "compress_calls", "Compress calls", metrics.compress_calls);
            push_counter(
                &mut output,
                name,
                "decompress_calls",
                "Decompress calls",
                metrics.decompress_calls,
            );
            push_counter(
                &mut output,
                name,
                "original_bytes",
                "Bytes before compression",
                metrics.original_bytes,
            );
            push_counter(
                &mut output,
                name,
                "compressed_bytes",
                "Bytes after compression",
                metrics.compressed_bytes,
            );
            if metrics.compress_errors > 0 || metrics.decompress_errors > 0 {
                push_counter(&mut output, name, "compress_errors", "Compress failures", metrics.compress_errors);
                push_counter(
                    &mut output,
                    name,
                    "decompress_errors",
                    "Decompress failures",
                    metrics.decompress_errors,
                );
            }
        }

        output.push_str("# HELP sac_marshal_type_selected_total Blocks marshaled per type\n");
        output.push_str("# TYPE sac_marshal_type_selected_total counter\n");
        for mt in MarshalType::ALL {
            output.push_str(&format!(
                "sac_marshal_type_selected_total{{type=\"{}\"}} {}\n",
                mt.name(),
                snapshot.selections.get(mt.name()).copied().unwrap_or(0)
            ));
        }

        output.push_str("# HELP sac_unmarshal_errors_total Blocks that failed to decode\n");
        output.push_str("# TYPE sac_unmarshal_errors_total counter\n");
        output.push_str(&format!("sac_unmarshal_errors_total {}\n", snapshot.unmarshal_errors));

        output
    }
}

impl Default for EncodingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_counter(output: &mut String, compressor: &str, metric: &str, help: &str, value: u64) {
    let name = format!("sac_{}_block_{}_total", compressor, metric);
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}

/// Full snapshot of encoding metrics for serialization
#[derive(Debug, Clone, serde::Serialize)]
pub struct EncodingMetricsSnapshot {
    /// zstd adapter counters
    pub zstd: CodecMetricsSnapshot,
    /// lz4 adapter counters
    pub lz4: CodecMetricsSnapshot,
    /// Repeat-elimination counters
    pub repeat_eliminate: CodecMetricsSnapshot,
    /// Blocks marshaled per tag name
    pub selections: BTreeMap<String, u64>,
    /// Block decode failures
    pub unmarshal_errors: u64,
}
