//! Self-adaptive block encoder
//!
//! Each block is classified once by cheap statistics and encoded with the
//! scheme its tag names. Decoding dispatches on the stored tag alone and
//! never re-classifies.
//!
//! # Decision procedure
//!
//! | Condition                                    | Tag                  |
//! |----------------------------------------------|----------------------|
//! | `len <= 1`                                   | `Const`              |
//! | `len == 2`                                   | `DeltaConst`         |
//! | hamming distance `== 0`                      | `Const`              |
//! | identical pairs `> repeat_ratio * N`         | `RepeatEliminate`    |
//! | distance `< delta2_distance_threshold`       | `ZstdNearestDelta2`  |
//! | distance `< delta_distance_threshold`        | `ZstdNearestDelta`   |
//! | otherwise                                    | `Zstd`               |
//!
//! # Example
//!
//! ```rust
//! use sac_encoding::compression::selector::AdaptiveEncoder;
//! use sac_encoding::types::MarshalType;
//!
//! let encoder = AdaptiveEncoder::default();
//! let block = encoder.marshal(&[42; 1024]).unwrap();
//! assert_eq!(block.marshal_type, MarshalType::Const);
//! assert!(block.body.is_empty());
//! assert_eq!(encoder.unmarshal(&block).unwrap(), vec![42; 1024]);
//! ```

use crate::compression::codecs::{Codec, DeltaCodec, DeltaKind, RepeatEliminateCodec};
use crate::compression::general::{compress_level, BackendKind, GeneralCompressor};
use crate::compression::metrics::{CompressionObserver, EncodingMetrics};
use crate::compression::nearest_delta::{check_precision_bits, nearest_delta2_residuals, nearest_delta_residuals};
use crate::compression::pool::{PoolStats, ScratchPools};
use crate::compression::statistics::complex_hamming_distance_with;
use crate::compression::varint::{marshal_var_int64, marshal_var_int64s, unmarshal_var_int64, unmarshal_var_int64s_exact};
use crate::config::EncodingConfig;
use crate::error::{CompressionError, Result};
use crate::types::{EncodedBlock, MarshalType, MAX_BLOCK_ITEMS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Thresholds driving [`get_marshal_type_with`]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// Identical-pair share above which a block is run-length encoded
    #[serde(default = "default_repeat_ratio_threshold")]
    pub repeat_ratio_threshold: f64,

    /// Distance below which second-order nearest delta is used
    #[serde(default = "default_delta2_distance_threshold")]
    pub delta2_distance_threshold: f64,

    /// Distance below which first-order nearest delta is used
    #[serde(default = "default_delta_distance_threshold")]
    pub delta_distance_threshold: f64,

    /// Nearest-delta precision, 1..=64 (64 is lossless)
    #[serde(default = "default_precision_bits")]
    pub precision_bits: u8,
}

fn default_repeat_ratio_threshold() -> f64 { 0.9 }
fn default_delta2_distance_threshold() -> f64 { 1.0 }
fn default_delta_distance_threshold() -> f64 { 20.5 }
fn default_precision_bits() -> u8 { 64 }

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            repeat_ratio_threshold: default_repeat_ratio_threshold(),
            delta2_distance_threshold: default_delta2_distance_threshold(),
            delta_distance_threshold: default_delta_distance_threshold(),
            precision_bits: default_precision_bits(),
        }
    }
}

/// Pick the tag for `values` with default thresholds
pub fn get_marshal_type(values: &[i64]) -> MarshalType {
    get_marshal_type_with(values, &SelectorConfig::default())
}

/// Pick the tag for `values`
///
/// Pure function of the block and thresholds.
pub fn get_marshal_type_with(values: &[i64], config: &SelectorConfig) -> MarshalType {
    match values.len() {
        0 | 1 => return MarshalType::Const,
        2 => return MarshalType::DeltaConst,
        _ => {}
    }

    let (distance, is_repeat) = complex_hamming_distance_with(values, config.repeat_ratio_threshold);
    let mt = if distance == 0.0 {
        MarshalType::Const
    } else if is_repeat {
        MarshalType::RepeatEliminate
    } else if distance < config.delta2_distance_threshold {
        MarshalType::ZstdNearestDelta2
    } else if distance < config.delta_distance_threshold {
        MarshalType::ZstdNearestDelta
    } else {
        MarshalType::Zstd
    };

    debug!(items = values.len(), distance, is_repeat, marshal_type = %mt, "classified block");
    mt
}

fn is_const(values: &[i64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn is_arithmetic(values: &[i64]) -> bool {
    match values {
        [] | [_] => true,
        [first, second, ..] => {
            let delta = second.wrapping_sub(*first);
            values.windows(2).all(|w| w[1].wrapping_sub(w[0]) == delta)
        }
    }
}

/// Block encoder owning its backend, scratch pools and metrics
///
/// Safe to share across threads; every call uses its own checked-out
/// scratch buffers.
pub struct AdaptiveEncoder {
    selector: SelectorConfig,
    backend_kind: BackendKind,
    backend: Arc<dyn GeneralCompressor>,
    /// 0 picks a level from the block size
    backend_level: i32,
    repeat: RepeatEliminateCodec,
    pools: ScratchPools,
    metrics: Arc<EncodingMetrics>,
}

impl AdaptiveEncoder {
    /// Create an encoder from `config` with fresh metrics
    pub fn new(config: &EncodingConfig) -> Result<Self> {
        Self::with_metrics(config, Arc::new(EncodingMetrics::new()))
    }

    /// Create an encoder reporting into `metrics`
    pub fn with_metrics(config: &EncodingConfig, metrics: Arc<EncodingMetrics>) -> Result<Self> {
        config.validate()?;

        let backend_observer: Arc<dyn CompressionObserver> = match config.backend.kind {
            BackendKind::Zstd => metrics.zstd.clone(),
            BackendKind::Lz4 => metrics.lz4.clone(),
        };
        let repeat_observer: Arc<dyn CompressionObserver> = metrics.repeat_eliminate.clone();

        Ok(Self {
            selector: config.selector.clone(),
            backend_kind: config.backend.kind,
            backend: config.backend.kind.build(backend_observer),
            backend_level: config.backend.level,
            repeat: RepeatEliminateCodec::new(repeat_observer),
            pools: ScratchPools::new(config.pool.max_buffers_per_class),
            metrics,
        })
    }

    /// Selection thresholds in use
    pub fn selector(&self) -> &SelectorConfig {
        &self.selector
    }

    /// General-purpose backend in use
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// Metrics this encoder reports into
    pub fn metrics(&self) -> &Arc<EncodingMetrics> {
        &self.metrics
    }

    /// Byte and integer scratch pool counters
    pub fn pool_stats(&self) -> (PoolStats, PoolStats) {
        (self.pools.bytes.stats(), self.pools.ints.stats())
    }

    /// Tag that [`AdaptiveEncoder::marshal_into`] would pick for `values`
    pub fn classify(&self, values: &[i64]) -> MarshalType {
        get_marshal_type_with(values, &self.selector)
    }

    fn level_for(&self, item_count: usize) -> i32 {
        if self.backend_level == 0 {
            compress_level(item_count)
        } else {
            self.backend_level
        }
    }

    /// Classify `values` and append the body to `dst`
    ///
    /// Returns the tag and the first value; both must be stored with the body.
    pub fn marshal_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<(MarshalType, i64)> {
        let mt = self.classify(values);
        let first = self.marshal_as(dst, values, mt)?;
        self.metrics.record_selection(mt);
        Ok((mt, first))
    }

    /// Classify and encode `values` into a standalone block
    pub fn marshal(&self, values: &[i64]) -> Result<EncodedBlock> {
        let mut body = Vec::new();
        let (marshal_type, first_value) = self.marshal_into(&mut body, values)?;
        Ok(EncodedBlock {
            marshal_type,
            first_value,
            item_count: values.len(),
            body,
        })
    }

    /// Encode `values` under every applicable tag and keep the smallest body
    ///
    /// Ties go to the tag listed first in [`MarshalType::ALL`].
    pub fn marshal_best(&self, values: &[i64]) -> Result<EncodedBlock> {
        let mut best: Option<EncodedBlock> = None;
        for mt in MarshalType::ALL {
            let applicable = match mt {
                MarshalType::Const => is_const(values),
                MarshalType::DeltaConst => is_arithmetic(values),
                _ => true,
            };
            if !applicable {
                continue;
            }

            let mut body = Vec::new();
            let first_value = self.marshal_as(&mut body, values, mt)?;
            if matches!(&best, Some(b) if b.body.len() <= body.len()) {
                continue;
            }
            best = Some(EncodedBlock {
                marshal_type: mt,
                first_value,
                item_count: values.len(),
                body,
            });
        }

        let block = best.ok_or(CompressionError::EmptyBlock { codec: "marshal_best" })?;
        debug!(items = values.len(), marshal_type = %block.marshal_type, size = block.body.len(), "best block");
        self.metrics.record_selection(block.marshal_type);
        Ok(block)
    }

    /// Encode `values` with the scheme named by `mt`, appending the body to `dst`
    ///
    /// `Const` and `DeltaConst` reject blocks they cannot represent exactly.
    pub fn marshal_as(&self, dst: &mut Vec<u8>, values: &[i64], mt: MarshalType) -> Result<i64> {
        let Some(&first) = values.first() else {
            return Err(CompressionError::EmptyBlock { codec: mt.name() });
        };
        if values.len() > MAX_BLOCK_ITEMS {
            return Err(CompressionError::BlockTooLarge {
                codec: mt.name(),
                items: values.len(),
                max: MAX_BLOCK_ITEMS,
            });
        }

        match mt {
            MarshalType::Const => {
                if !is_const(values) {
                    return Err(CompressionError::InvalidData(
                        "const encoding requires identical values".to_string(),
                    ));
                }
            }
            MarshalType::DeltaConst => {
                if !is_arithmetic(values) {
                    return Err(CompressionError::InvalidData(
                        "delta_const encoding requires a constant delta".to_string(),
                    ));
                }
                let delta = values.get(1).map_or(0, |second| second.wrapping_sub(first));
                marshal_var_int64(dst, delta);
            }
            MarshalType::RepeatEliminate => {
                self.repeat.compress_into(dst, values)?;
            }
            MarshalType::ZstdNearestDelta2 | MarshalType::ZstdNearestDelta | MarshalType::Zstd => {
                let mut residuals = self.pools.ints.get(values.len());
                match mt {
                    MarshalType::ZstdNearestDelta2 => {
                        nearest_delta2_residuals(&mut residuals, values, self.selector.precision_bits)?
                    }
                    MarshalType::ZstdNearestDelta => {
                        nearest_delta_residuals(&mut residuals, values, self.selector.precision_bits)?
                    }
                    _ => residuals.extend_from_slice(&values[1..]),
                }

                let mut raw = self.pools.bytes.get(residuals.len() * 2);
                marshal_var_int64s(&mut raw, &residuals);
                let compressed = self.backend.compress(&raw, self.level_for(values.len()))?;
                dst.extend_from_slice(&compressed);
            }
        }
        Ok(first)
    }

    /// Decode a body tagged `mt`, appending `count` values to `dst`
    ///
    /// On failure `dst` is restored to its original length.
    pub fn unmarshal_into(
        &self,
        dst: &mut Vec<i64>,
        src: &[u8],
        mt: MarshalType,
        first: i64,
        count: usize,
    ) -> Result<()> {
        let start = dst.len();
        match self.decode_body(dst, src, mt, first, count) {
            Ok(()) => Ok(()),
            Err(e) => {
                dst.truncate(start);
                self.metrics.record_unmarshal_error();
                warn!(marshal_type = %mt, len = src.len(), count, error = %e, "cannot unmarshal block");
                Err(match e {
                    e @ CompressionError::Decode { .. } => e,
                    e => CompressionError::decode(mt.name(), src, e),
                })
            }
        }
    }

    /// Decode a standalone block
    pub fn unmarshal(&self, block: &EncodedBlock) -> Result<Vec<i64>> {
        let mut values = Vec::with_capacity(block.item_count.min(MAX_BLOCK_ITEMS));
        self.unmarshal_into(
            &mut values,
            &block.body,
            block.marshal_type,
            block.first_value,
            block.item_count,
        )?;
        Ok(values)
    }

    fn decode_body(&self, dst: &mut Vec<i64>, src: &[u8], mt: MarshalType, first: i64, count: usize) -> Result<()> {
        if count == 0 {
            return Err(CompressionError::EmptyBlock { codec: mt.name() });
        }
        if count > MAX_BLOCK_ITEMS {
            return Err(CompressionError::corrupt(format!(
                "item count {} exceeds {}",
                count, MAX_BLOCK_ITEMS
            )));
        }

        match mt {
            MarshalType::Const => {
                if !src.is_empty() {
                    return Err(CompressionError::corrupt(format!(
                        "const block must have an empty body; got {} bytes",
                        src.len()
                    )));
                }
                dst.extend(std::iter::repeat(first).take(count));
            }
            MarshalType::DeltaConst => {
                let (delta, tail) = unmarshal_var_int64(src)?;
                if !tail.is_empty() {
                    return Err(CompressionError::corrupt(format!(
                        "unexpected tail left after unmarshaling delta_const: len(tail)={}",
                        tail.len()
                    )));
                }
                let mut v = first;
                dst.reserve(count);
                for _ in 0..count {
                    dst.push(v);
                    v = v.wrapping_add(delta);
                }
            }
            MarshalType::RepeatEliminate => {
                self.repeat.decompress_into(dst, src, first, count)?;
            }
            MarshalType::ZstdNearestDelta2 | MarshalType::ZstdNearestDelta | MarshalType::Zstd => {
                let raw = self.backend.decompress(src)?;
                // Every varint takes at least one byte
                if count - 1 > raw.len() {
                    return Err(CompressionError::corrupt(format!(
                        "{} residuals cannot fit in {} decompressed bytes",
                        count - 1,
                        raw.len()
                    )));
                }
                let mut residuals = self.pools.ints.get(count - 1);
                unmarshal_var_int64s_exact(&mut residuals, &raw, count - 1)?;
                match mt {
                    MarshalType::ZstdNearestDelta2 => {
                        DeltaCodec::new(DeltaKind::Delta2).integrate(dst, first, &residuals)
                    }
                    MarshalType::ZstdNearestDelta => DeltaCodec::new(DeltaKind::Delta).integrate(dst, first, &residuals),
                    _ => {
                        dst.push(first);
                        dst.extend_from_slice(&residuals);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for AdaptiveEncoder {
    fn default() -> Self {
        let metrics = Arc::new(EncodingMetrics::new());
        let selector = SelectorConfig::default();
        let repeat_observer: Arc<dyn CompressionObserver> = metrics.repeat_eliminate.clone();
        Self {
            backend: BackendKind::Zstd.build(metrics.zstd.clone()),
            backend_kind: BackendKind::Zstd,
            backend_level: 0,
            repeat: RepeatEliminateCodec::new(repeat_observer),
            pools: ScratchPools::default(),
            selector,
            metrics,
        }
    }
}

impl std::fmt::Debug for AdaptiveEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveEncoder")
            .field("selector", &self.selector)
            .field("backend", &self.backend_kind)
            .field("backend_level", &self.backend_level)
            .finish_non_exhaustive()
    }
}

/// Validate selector thresholds
pub(crate) fn validate_selector(config: &SelectorConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.repeat_ratio_threshold) {
        return Err(CompressionError::Configuration(format!(
            "repeat_ratio_threshold must be within [0, 1]; got {}",
            config.repeat_ratio_threshold
        )));
    }
    if config.delta2_distance_threshold.is_nan() || config.delta2_distance_threshold < 0.0 {
        return Err(CompressionError::Configuration(format!(
            "delta2_distance_threshold must be non-negative; got {}",
            config.delta2_distance_threshold
        )));
    }
    if config.delta_distance_threshold.is_nan() || config.delta_distance_threshold <= config.delta2_distance_threshold {
        return Err(CompressionError::Configuration(format!(
            "delta_distance_threshold ({}) must exceed delta2_distance_threshold ({})",
            config.delta_distance_threshold, config.delta2_distance_threshold
        )));
    }
    check_precision_bits(config.precision_bits).map_err(|e| CompressionError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::codecs::test_data;

    fn roundtrip(encoder: &AdaptiveEncoder, values: &[i64]) -> EncodedBlock {
        let block = encoder.marshal(values).unwrap();
        assert_eq!(encoder.unmarshal(&block).unwrap(), values, "{}", block.marshal_type);
        block
    }

    #[test]
    fn test_decision_boundaries() {
        assert_eq!(get_marshal_type(&[]), MarshalType::Const);
        assert_eq!(get_marshal_type(&[9]), MarshalType::Const);
        assert_eq!(get_marshal_type(&[9, 1_000_000]), MarshalType::DeltaConst);
        assert_eq!(get_marshal_type(&[3; 100]), MarshalType::Const);

        let mut mostly = vec![3i64; 100];
        mostly[50] = 4;
        assert_eq!(get_marshal_type(&mostly), MarshalType::RepeatEliminate);

        assert_eq!(get_marshal_type(&test_data::random(1000)), MarshalType::Zstd);
    }

    #[test]
    fn test_distance_bands() {
        // Alternating low bit: one changed bit per pair
        let slow: Vec<i64> = (0..1000).map(|i| 1_000 + (i % 2)).collect();
        let (distance, _) = complex_hamming_distance_with(&slow, 0.9);
        assert!(distance < 1.0);
        assert_eq!(get_marshal_type(&slow), MarshalType::ZstdNearestDelta2);

        let counter = test_data::counter(1000);
        let (distance, _) = complex_hamming_distance_with(&counter, 0.9);
        assert!((1.0..20.5).contains(&distance));
        assert_eq!(get_marshal_type(&counter), MarshalType::ZstdNearestDelta);
    }

    #[test]
    fn test_custom_thresholds() {
        let counter = test_data::counter(1000);
        let config = SelectorConfig {
            delta_distance_threshold: 1.5,
            ..SelectorConfig::default()
        };
        assert_eq!(get_marshal_type_with(&counter, &config), MarshalType::Zstd);
    }

    #[test]
    fn test_roundtrip_all_shapes() {
        let encoder = AdaptiveEncoder::default();
        for values in test_data::all_shapes() {
            roundtrip(&encoder, &values);
        }
        roundtrip(&encoder, &[i64::MIN, i64::MAX]);
        roundtrip(&encoder, &[7]);
    }

    #[test]
    fn test_const_block_has_empty_body() {
        let encoder = AdaptiveEncoder::default();
        let block = roundtrip(&encoder, &[-5; 1024]);
        assert_eq!(block.marshal_type, MarshalType::Const);
        assert!(block.body.is_empty());
        assert_eq!(encoder.metrics().selections(MarshalType::Const), 1);
    }

    #[test]
    fn test_delta_const_any_count() {
        let encoder = AdaptiveEncoder::default();
        let mut body = Vec::new();
        encoder.marshal_as(&mut body, &[10, 13], MarshalType::DeltaConst).unwrap();

        let mut out = vec![1, 2];
        encoder.unmarshal_into(&mut out, &body, MarshalType::DeltaConst, 10, 5).unwrap();
        assert_eq!(out, vec![1, 2, 10, 13, 16, 19, 22]);
    }

    #[test]
    fn test_marshal_as_rejects_inexact_tags() {
        let encoder = AdaptiveEncoder::default();
        let mut body = Vec::new();
        assert!(encoder.marshal_as(&mut body, &[1, 2], MarshalType::Const).is_err());
        assert!(encoder.marshal_as(&mut body, &[1, 2, 4], MarshalType::DeltaConst).is_err());
        assert!(matches!(
            encoder.marshal_as(&mut body, &[], MarshalType::Zstd),
            Err(CompressionError::EmptyBlock { .. })
        ));
    }

    #[test]
    fn test_const_with_body_rejected() {
        let encoder = AdaptiveEncoder::default();
        let mut out = vec![1, 2, 3, 4];
        let err = encoder
            .unmarshal_into(&mut out, &[0x00], MarshalType::Const, 5, 3)
            .unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(encoder.metrics().snapshot().unmarshal_errors, 1);
    }

    #[test]
    fn test_truncated_backend_body_rolls_back() {
        let encoder = AdaptiveEncoder::default();
        let values = test_data::random(500);
        let block = encoder.marshal(&values).unwrap();
        assert_eq!(block.marshal_type, MarshalType::Zstd);

        let mut out = vec![1, 2, 3, 4];
        let truncated = &block.body[..block.body.len() - 1];
        assert!(encoder
            .unmarshal_into(&mut out, truncated, block.marshal_type, block.first_value, values.len())
            .is_err());
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_marshal_best_not_larger() {
        let encoder = AdaptiveEncoder::default();
        for values in test_data::all_shapes() {
            let chosen = encoder.marshal(&values).unwrap();
            let best = encoder.marshal_best(&values).unwrap();
            assert!(best.body.len() <= chosen.body.len());
            assert_eq!(encoder.unmarshal(&best).unwrap(), values);
        }
    }

    #[test]
    fn test_lz4_backend() {
        let mut config = EncodingConfig::default();
        config.backend.kind = BackendKind::Lz4;
        let encoder = AdaptiveEncoder::new(&config).unwrap();
        roundtrip(&encoder, &test_data::random(300));
        roundtrip(&encoder, &test_data::counter(300));

        let snapshot = encoder.metrics().snapshot();
        assert_eq!(snapshot.lz4.compress_calls, 2);
        assert_eq!(snapshot.zstd.compress_calls, 0);
    }

    #[test]
    fn test_repeat_path_reports_metrics() {
        let encoder = AdaptiveEncoder::default();
        let mut values = vec![8i64; 200];
        values[100] = 9;
        let block = roundtrip(&encoder, &values);
        assert_eq!(block.marshal_type, MarshalType::RepeatEliminate);

        let snapshot = encoder.metrics().snapshot();
        assert_eq!(snapshot.repeat_eliminate.compress_calls, 1);
        assert_eq!(snapshot.repeat_eliminate.decompress_calls, 1);
        assert_eq!(snapshot.repeat_eliminate.original_bytes, 1600);
    }

    #[test]
    fn test_lossy_precision_bound() {
        let mut config = EncodingConfig::default();
        config.selector.precision_bits = 20;
        let encoder = AdaptiveEncoder::new(&config).unwrap();

        let values: Vec<i64> = (0..1000).map(|i| 1_000_000_000 + i * 3).collect();
        let block = encoder.marshal(&values).unwrap();
        assert_eq!(block.marshal_type, MarshalType::ZstdNearestDelta);
        let decoded = encoder.unmarshal(&block).unwrap();
        for (&v, &r) in values.iter().zip(&decoded) {
            assert!((v - r).unsigned_abs() <= v.unsigned_abs() >> 20);
        }
    }

    #[test]
    fn test_pool_reuse() {
        let encoder = AdaptiveEncoder::default();
        let values = test_data::counter(1000);
        for _ in 0..4 {
            roundtrip(&encoder, &values);
        }
        let (bytes, ints) = encoder.pool_stats();
        assert!(bytes.hits > 0);
        assert!(ints.hits > 0);
    }

    #[test]
    fn test_validate_selector() {
        assert!(validate_selector(&SelectorConfig::default()).is_ok());
        let bad = SelectorConfig {
            repeat_ratio_threshold: 1.5,
            ..SelectorConfig::default()
        };
        assert!(validate_selector(&bad).is_err());
        let bad = SelectorConfig {
            delta_distance_threshold: 0.5,
            ..SelectorConfig::default()
        };
        assert!(validate_selector(&bad).is_err());
        let bad = SelectorConfig {
            precision_bits: 0,
            ..SelectorConfig::default()
        };
        assert!(validate_selector(&bad).is_err());
    }
}
