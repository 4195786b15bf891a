//! Repeat elimination (run-length) codec
//!
//! Runs of identical consecutive values collapse to `(value, run)` pairs. The
//! body is a varint array: its first element is the number of pair elements
//! that follow (always even), then the pairs themselves.
//!
//! A stored run may describe more repeats than the caller asks for; decoding
//! stops at the requested count and drops the excess.

use super::{check_block, check_first, Codec, CodecId};
use crate::compression::metrics::{CompressionObserver, NoopObserver};
use crate::compression::varint::{marshal_var_int64, unmarshal_var_int64, unmarshal_var_int64s_exact};
use crate::error::{CompressionError, Result};
use crate::types::MAX_BLOCK_ITEMS;
use std::sync::Arc;

/// Run-length codec reporting to a [`CompressionObserver`]
#[derive(Clone)]
pub struct RepeatEliminateCodec {
    observer: Arc<dyn CompressionObserver>,
}

impl RepeatEliminateCodec {
    /// Create a codec that reports calls and byte totals to `observer`
    pub fn new(observer: Arc<dyn CompressionObserver>) -> Self {
        Self { observer }
    }

    /// Number of runs in `values`
    pub fn run_count(values: &[i64]) -> usize {
        if values.is_empty() {
            return 0;
        }
        1 + values.windows(2).filter(|w| w[0] != w[1]).count()
    }
}

impl Default for RepeatEliminateCodec {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

impl std::fmt::Debug for RepeatEliminateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatEliminateCodec").finish_non_exhaustive()
    }
}

impl Codec for RepeatEliminateCodec {
    fn id(&self) -> CodecId {
        CodecId::RepeatEliminate
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_BLOCK_ITEMS)?;
        self.observer.incr_compress_calls();
        self.observer.add_original_bytes(values.len() * 8);

        let start = dst.len();
        let runs = Self::run_count(values);
        marshal_var_int64(dst, (runs * 2) as i64);

        let mut prev = values[0];
        let mut run = 1i64;
        for &v in &values[1..] {
            if v == prev {
                run += 1;
            } else {
                marshal_var_int64(dst, prev);
                marshal_var_int64(dst, run);
                prev = v;
                run = 1;
            }
        }
        marshal_var_int64(dst, prev);
        marshal_var_int64(dst, run);

        self.observer.add_compressed_bytes(dst.len() - start);
        Ok(values[0])
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        self.observer.incr_decompress_calls();

        let (total, rest) = unmarshal_var_int64(src)?;
        if total <= 0 || total % 2 != 0 {
            return Err(CompressionError::corrupt(format!(
                "run-length pair array must have a positive even length; got {}",
                total
            )));
        }
        // Every varint takes at least one byte
        if total as usize > rest.len() {
            return Err(CompressionError::corrupt(format!(
                "run-length header claims {} items but only {} bytes follow",
                total,
                rest.len()
            )));
        }

        let mut pairs = Vec::with_capacity(total as usize);
        unmarshal_var_int64s_exact(&mut pairs, rest, total as usize)?;
        check_first(pairs[0], first)?;

        let mut remaining = count;
        for pair in pairs.chunks_exact(2) {
            let (value, run) = (pair[0], pair[1]);
            if run <= 0 {
                return Err(CompressionError::corrupt(format!("non-positive run length {}", run)));
            }
            let take = (run as u64).min(remaining as u64) as usize;
            dst.extend(std::iter::repeat(value).take(take));
            remaining -= take;
            if remaining == 0 {
                return Ok(());
            }
        }

        Err(CompressionError::corrupt(format!(
            "data is less than wanted; got {}; still want {}",
            count - remaining,
            remaining
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::metrics::CodecMetrics;
    use crate::compression::varint::marshal_var_int64s;

    #[test]
    fn test_pair_layout() {
        let codec = RepeatEliminateCodec::default();
        let (body, first) = codec.compress(&[5, 5, 5, 9, 9, 5]).unwrap();
        assert_eq!(first, 5);

        let mut expected = Vec::new();
        marshal_var_int64s(&mut expected, &[6, 5, 3, 9, 2, 5, 1]);
        assert_eq!(body, expected);
    }

    #[test]
    fn test_overshooting_run_truncated() {
        let codec = RepeatEliminateCodec::default();
        let (body, first) = codec.compress(&[1, 1, 2, 2, 2, 2]).unwrap();
        assert_eq!(codec.decompress(&body, first, 4).unwrap(), vec![1, 1, 2, 2]);
        assert_eq!(codec.decompress(&body, first, 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_runs_exhausted_rejected() {
        let codec = RepeatEliminateCodec::default();
        let (body, first) = codec.compress(&[1, 1, 2]).unwrap();
        let err = codec.decompress(&body, first, 4).unwrap_err();
        assert!(err.to_string().contains("less than wanted"));
    }

    #[test]
    fn test_odd_pair_array_rejected() {
        let mut body = Vec::new();
        marshal_var_int64s(&mut body, &[3, 7, 2, 7]);
        let err = RepeatEliminateCodec::default().decompress(&body, 7, 2).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_non_positive_run_rejected() {
        let mut body = Vec::new();
        marshal_var_int64s(&mut body, &[4, 7, 1, 8, 0]);
        let err = RepeatEliminateCodec::default().decompress(&body, 7, 3).unwrap_err();
        assert!(err.to_string().contains("non-positive"));
    }

    #[test]
    fn test_claimed_length_beyond_input_rejected() {
        let mut body = Vec::new();
        marshal_var_int64s(&mut body, &[1_000_000, 7, 1]);
        assert!(RepeatEliminateCodec::default().decompress(&body, 7, 1).is_err());
    }

    #[test]
    fn test_observer_counts() {
        let metrics = Arc::new(CodecMetrics::new());
        let codec = RepeatEliminateCodec::new(metrics.clone());
        let values = vec![3i64; 100];
        let (body, first) = codec.compress(&values).unwrap();
        codec.decompress(&body, first, values.len()).unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.compress_calls, 1);
        assert_eq!(snap.decompress_calls, 1);
        assert_eq!(snap.original_bytes, 800);
        assert_eq!(snap.compressed_bytes, body.len() as u64);
    }

    #[test]
    fn test_run_count() {
        assert_eq!(RepeatEliminateCodec::run_count(&[]), 0);
        assert_eq!(RepeatEliminateCodec::run_count(&[1]), 1);
        assert_eq!(RepeatEliminateCodec::run_count(&[1, 1, 2, 1]), 3);
    }
}
