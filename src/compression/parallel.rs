//! Parallel block encoding
//!
//! Blocks are independent, so a batch fans out across rayon workers with no
//! locking beyond the scratch pool checkouts inside [`AdaptiveEncoder`].
//!
//! ```text
//! ┌──────────┐ ┌──────────┐ ┌──────────┐
//! │ Block 0  │ │ Block 1  │ │ Block 2  │
//! └────┬─────┘ └────┬─────┘ └────┬─────┘
//!      └────────────┼────────────┘
//!            ┌──────▼───────┐
//!            │ rayon pool   │
//!            └──────┬───────┘
//!      ┌────────────┼────────────┐
//!      ▼            ▼            ▼
//!  result 0     result 1     result 2     (input order)
//! ```
//!
//! Batches smaller than `min_parallel_blocks` run on the calling thread.
//! A failing block yields an `Err` in its slot and does not affect the rest.
//!
//! # Example
//!
//! ```rust
//! use sac_encoding::compression::parallel::ParallelEncoder;
//!
//! let encoder = ParallelEncoder::default();
//! let blocks: Vec<Vec<i64>> = (0..8).map(|b| (0..256).map(|i| b * 1000 + i).collect()).collect();
//!
//! let encoded = encoder.marshal_blocks(&blocks);
//! let encoded: Vec<_> = encoded.into_iter().map(|r| r.unwrap()).collect();
//! let decoded = encoder.unmarshal_blocks(&encoded);
//! assert_eq!(decoded[3].as_ref().unwrap(), &blocks[3]);
//! ```

use crate::compression::selector::AdaptiveEncoder;
use crate::config::{EncodingConfig, ParallelConfig};
use crate::error::{CompressionError, Result};
use crate::types::EncodedBlock;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Aggregate statistics for one batch
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    /// Blocks in the batch
    pub block_count: usize,
    /// Values across all blocks
    pub total_items: usize,
    /// Raw size, 8 bytes per value
    pub total_original_bytes: usize,
    /// Encoded size including per-block metadata
    pub total_encoded_bytes: usize,
    /// Blocks that failed to encode
    pub failed_count: usize,
    /// Wall clock time for the batch (microseconds)
    pub wall_time_us: u64,
}

impl BatchStats {
    /// Raw over encoded size
    pub fn compression_ratio(&self) -> f64 {
        if self.total_encoded_bytes == 0 {
            return 0.0;
        }
        self.total_original_bytes as f64 / self.total_encoded_bytes as f64
    }

    /// Average encoded bits per value
    pub fn bits_per_value(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        (self.total_encoded_bytes * 8) as f64 / self.total_items as f64
    }
}

/// Batch encoder fanning blocks out over a rayon pool
pub struct ParallelEncoder {
    encoder: Arc<AdaptiveEncoder>,
    config: ParallelConfig,
    /// Dedicated pool when `max_threads` is set, otherwise rayon's global pool
    pool: Option<rayon::ThreadPool>,
}

impl ParallelEncoder {
    /// Wrap `encoder`
    pub fn new(encoder: Arc<AdaptiveEncoder>, config: ParallelConfig) -> Result<Self> {
        let pool = if config.max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.max_threads)
                .thread_name(|i| format!("sac-encode-{}", i))
                .build()
                .map_err(|e| CompressionError::Configuration(format!("cannot build thread pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self { encoder, config, pool })
    }

    /// Build the block encoder and the fan-out from one config
    pub fn from_config(config: &EncodingConfig) -> Result<Self> {
        let encoder = Arc::new(AdaptiveEncoder::new(config)?);
        Self::new(encoder, config.parallel.clone())
    }

    /// Underlying block encoder
    pub fn encoder(&self) -> &Arc<AdaptiveEncoder> {
        &self.encoder
    }

    fn run<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if items.len() < self.config.min_parallel_blocks.max(2) {
            return items.iter().map(f).collect();
        }

        debug!(blocks = items.len(), "parallel fan-out");
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.par_iter().map(f).collect(),
        }
    }

    /// Marshal each block; results keep input order
    pub fn marshal_blocks<B>(&self, blocks: &[B]) -> Vec<Result<EncodedBlock>>
    where
        B: AsRef<[i64]> + Sync,
    {
        self.run(blocks, |values| self.encoder.marshal(values.as_ref()))
    }

    /// Marshal each block with an exhaustive trial of every applicable tag
    pub fn marshal_blocks_best<B>(&self, blocks: &[B]) -> Vec<Result<EncodedBlock>>
    where
        B: AsRef<[i64]> + Sync,
    {
        self.run(blocks, |values| self.encoder.marshal_best(values.as_ref()))
    }

    /// Unmarshal each block; results keep input order
    pub fn unmarshal_blocks(&self, blocks: &[EncodedBlock]) -> Vec<Result<Vec<i64>>> {
        self.run(blocks, |block| self.encoder.unmarshal(block))
    }

    /// Marshal a batch and summarize it
    pub fn marshal_blocks_with_stats<B>(&self, blocks: &[B]) -> (Vec<Result<EncodedBlock>>, BatchStats)
    where
        B: AsRef<[i64]> + Sync,
    {
        let start = Instant::now();
        let results = self.marshal_blocks(blocks);

        let mut stats = BatchStats {
            block_count: blocks.len(),
            wall_time_us: start.elapsed().as_micros() as u64,
            ..Default::default()
        };
        for (values, result) in blocks.iter().zip(&results) {
            let items = values.as_ref().len();
            stats.total_items += items;
            stats.total_original_bytes += items * 8;
            match result {
                Ok(block) => stats.total_encoded_bytes += block.encoded_size(),
                Err(e) => {
                    stats.failed_count += 1;
                    warn!(items, error = %e, "block failed to encode");
                }
            }
        }

        (results, stats)
    }
}

impl Default for ParallelEncoder {
    fn default() -> Self {
        Self {
            encoder: Arc::new(AdaptiveEncoder::default()),
            config: ParallelConfig::default(),
            pool: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_blocks(count: usize, len: usize) -> Vec<Vec<i64>> {
        (0..count)
            .map(|b| (0..len as i64).map(|i| b as i64 * 1_000_000 + i * (b as i64 + 1)).collect())
            .collect()
    }

    #[test]
    fn test_order_preserved() {
        let encoder = ParallelEncoder::default();
        let blocks = make_blocks(32, 500);

        let encoded: Vec<EncodedBlock> = encoder
            .marshal_blocks(&blocks)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        for (block, values) in encoded.iter().zip(&blocks) {
            assert_eq!(block.first_value, values[0]);
            assert_eq!(block.item_count, values.len());
        }

        let decoded = encoder.unmarshal_blocks(&encoded);
        for (decoded, values) in decoded.into_iter().zip(&blocks) {
            assert_eq!(&decoded.unwrap(), values);
        }
    }

    #[test]
    fn test_failing_block_is_isolated() {
        let encoder = ParallelEncoder::default();
        let mut blocks = make_blocks(8, 100);
        blocks[3].clear();

        let results = encoder.marshal_blocks(&blocks);
        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.is_err(), i == 3);
        }
    }

    #[test]
    fn test_sequential_below_threshold() {
        let mut config = EncodingConfig::default();
        config.parallel.min_parallel_blocks = 100;
        config.parallel.max_threads = 2;
        let encoder = ParallelEncoder::from_config(&config).unwrap();

        let blocks = make_blocks(3, 64);
        let results = encoder.marshal_blocks(&blocks);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_dedicated_pool() {
        let mut config = EncodingConfig::default();
        config.parallel.max_threads = 2;
        config.parallel.min_parallel_blocks = 1;
        let encoder = ParallelEncoder::from_config(&config).unwrap();

        let blocks = make_blocks(16, 256);
        let (results, stats) = encoder.marshal_blocks_with_stats(&blocks);
        assert_eq!(results.len(), 16);
        assert_eq!(stats.block_count, 16);
        assert_eq!(stats.total_items, 16 * 256);
        assert_eq!(stats.failed_count, 0);
        assert!(stats.compression_ratio() > 1.0);
        assert!(stats.bits_per_value() < 64.0);
    }

    #[test]
    fn test_empty_batch() {
        let encoder = ParallelEncoder::default();
        let blocks: Vec<Vec<i64>> = Vec::new();
        assert!(encoder.marshal_blocks(&blocks).is_empty());
        assert!(encoder.unmarshal_blocks(&[]).is_empty());
    }

    #[test]
    fn test_best_blocks_roundtrip() {
        let encoder = ParallelEncoder::default();
        let blocks = make_blocks(6, 300);
        let encoded: Vec<EncodedBlock> = encoder
            .marshal_blocks_best(&blocks)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let decoded = encoder.unmarshal_blocks(&encoded);
        for (decoded, values) in decoded.into_iter().zip(&blocks) {
            assert_eq!(&decoded.unwrap(), values);
        }
    }
}
