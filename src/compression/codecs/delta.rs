//! Exact difference codecs
//!
//! Residuals between consecutive values are written as zig-zag varints with
//! no header. The first value travels out of band, so a block of `n` values
//! stores `n - 1` residuals:
//!
//! - `Delta`: `v[i] - v[i-1]`
//! - `Delta2`: the first delta, then `d[i] - d[i-1]`
//! - `DeltaXor`: running XOR of the deltas, `r[i] = r[i-1] ^ d[i]`
//! - `XorDelta`: deltas of the XORs, `r[i] = (v[i] ^ v[i-1]) - r[i-1]`
//!
//! Arithmetic wraps, so every `i64` sequence round-trips.

use super::{check_block, Codec, CodecId};
use crate::compression::varint::{marshal_var_int64, unmarshal_var_int64s_exact};
use crate::error::{CompressionError, Result};
use crate::types::MAX_BLOCK_ITEMS;

/// Residual transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// First-order differences
    Delta,
    /// Second-order differences
    Delta2,
    /// Delta of consecutive XORs
    XorDelta,
    /// Running XOR of consecutive deltas
    DeltaXor,
}

/// Varint residual codec
#[derive(Debug, Clone, Copy)]
pub struct DeltaCodec {
    kind: DeltaKind,
}

impl DeltaCodec {
    /// Create a codec applying `kind`
    pub fn new(kind: DeltaKind) -> Self {
        Self { kind }
    }

    /// Residual transform in use
    pub fn kind(&self) -> DeltaKind {
        self.kind
    }

    /// Append the residuals of `values[1..]` to `residuals`
    pub fn residuals(&self, residuals: &mut Vec<i64>, values: &[i64]) {
        let mut prev = match values.first() {
            Some(&v) => v,
            None => return,
        };
        let mut state = 0i64;
        for &v in &values[1..] {
            let r = match self.kind {
                DeltaKind::Delta => v.wrapping_sub(prev),
                DeltaKind::Delta2 => {
                    let d = v.wrapping_sub(prev);
                    let r = if residuals.is_empty() { d } else { d.wrapping_sub(state) };
                    state = d;
                    r
                }
                DeltaKind::DeltaXor => {
                    state ^= v.wrapping_sub(prev);
                    state
                }
                DeltaKind::XorDelta => {
                    state = (v ^ prev).wrapping_sub(state);
                    state
                }
            };
            residuals.push(r);
            prev = v;
        }
    }

    /// Rebuild values from `first` and its residuals, appending to `dst`
    pub fn integrate(&self, dst: &mut Vec<i64>, first: i64, residuals: &[i64]) {
        let mut v = first;
        let mut state = 0i64;
        dst.push(v);
        for (i, &r) in residuals.iter().enumerate() {
            match self.kind {
                DeltaKind::Delta => v = v.wrapping_add(r),
                DeltaKind::Delta2 => {
                    state = if i == 0 { r } else { state.wrapping_add(r) };
                    v = v.wrapping_add(state);
                }
                DeltaKind::DeltaXor => {
                    v = v.wrapping_add(state ^ r);
                    state = r;
                }
                DeltaKind::XorDelta => {
                    v ^= state.wrapping_add(r);
                    state = r;
                }
            }
            dst.push(v);
        }
    }
}

impl Codec for DeltaCodec {
    fn id(&self) -> CodecId {
        match self.kind {
            DeltaKind::Delta => CodecId::Delta,
            DeltaKind::Delta2 => CodecId::Delta2,
            DeltaKind::XorDelta => CodecId::XorDelta,
            DeltaKind::DeltaXor => CodecId::DeltaXor,
        }
    }

    fn compress_into(&self, dst: &mut Vec<u8>, values: &[i64]) -> Result<i64> {
        check_block(self.name(), values.len(), MAX_BLOCK_ITEMS)?;

        let mut residuals = Vec::with_capacity(values.len() - 1);
        self.residuals(&mut residuals, values);
        for &r in &residuals {
            marshal_var_int64(dst, r);
        }
        Ok(values[0])
    }

    fn decode_into(&self, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
        if count == 0 {
            return Err(CompressionError::EmptyBlock { codec: self.name() });
        }
        let wanted = count - 1;
        // Every varint takes at least one byte
        if wanted > src.len() {
            return Err(CompressionError::corrupt(format!(
                "{} residuals cannot fit in {} bytes",
                wanted,
                src.len()
            )));
        }

        let mut residuals = Vec::with_capacity(wanted);
        unmarshal_var_int64s_exact(&mut residuals, src, wanted)?;
        self.integrate(dst, first, &residuals);
        Ok(())
    }
}
