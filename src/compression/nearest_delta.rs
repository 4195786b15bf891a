//! Precision-bounded delta encoders
//!
//! With `precision_bits == 64` these are plain first- and second-order delta
//! encoders. Below 64, each residual is rounded to a multiple of
//! `2^tz`, where `tz = bit_len(|v|) - precision_bits` for the value `v` being
//! encoded. Residuals are computed against the *reconstructed* previous value,
//! so rounding error never accumulates and every decoded value `r` satisfies
//!
//! ```text
//! |v - r| <= |v| * 2^-precision_bits
//! ```
//!
//! `tz` may grow by at most two bits per step after a jump, so one outlier
//! does not zero out the low bits of the values around it.
//!
//! Decoding does not depend on the precision; the body is a varint residual
//! stream either way.

use crate::compression::codecs::{DeltaCodec, DeltaKind};
use crate::compression::varint::{marshal_var_int64s, unmarshal_var_int64s_exact};
use crate::error::{CompressionError, Result};

/// Exact precision
pub const EXACT_PRECISION: u8 = 64;

/// Validate a precision in `1..=64`
pub fn check_precision_bits(precision_bits: u8) -> Result<()> {
    if !(1..=64).contains(&precision_bits) {
        return Err(CompressionError::InvalidPrecision(precision_bits));
    }
    Ok(())
}

#[inline]
fn bit_len(v: i64) -> u32 {
    64 - v.unsigned_abs().leading_zeros()
}

/// Low bits of `v` that may be dropped at `precision_bits`
fn trailing_zeros_for(v: i64, precision_bits: u8) -> u32 {
    bit_len(v).saturating_sub(precision_bits as u32)
}

#[inline]
fn dec_if_non_zero(tz: u32) -> u32 {
    tz.saturating_sub(1)
}

/// Round residual `d` for target value `next`
///
/// Returns the rounded residual and the trailing-zero count to carry forward.
fn nearest_delta(d: i64, next: i64, precision_bits: u8, prev_tz: u32) -> (i64, u32) {
    if d == 0 {
        return (0, dec_if_non_zero(prev_tz));
    }

    let target = trailing_zeros_for(next, precision_bits);
    if target == 0 {
        return (d, dec_if_non_zero(prev_tz));
    }

    let tz = if target > prev_tz + 4 { prev_tz + 2 } else { target };
    if tz == 0 {
        return (d, 0);
    }

    let mask = ((1u64 << tz) - 1) as i64;
    let half = (1u64 << (tz - 1)) as i64;
    let rounded = d.wrapping_add(half) & !mask;
    // Near the ends of the i64 range the rounded value may not be representable
    if next.checked_sub(d.wrapping_sub(rounded)).is_none() {
        return (d, tz);
    }
    (rounded, tz)
}

/// First-order residuals of `values[1..]` at `precision_bits`
pub fn nearest_delta_residuals(residuals: &mut Vec<i64>, values: &[i64], precision_bits: u8) -> Result<()> {
    check_precision_bits(precision_bits)?;
    let Some(&first) = values.first() else {
        return Err(CompressionError::EmptyBlock { codec: "nearest_delta" });
    };

    if precision_bits == EXACT_PRECISION {
        DeltaCodec::new(DeltaKind::Delta).residuals(residuals, values);
        return Ok(());
    }

    let mut v = first;
    let mut tz = trailing_zeros_for(v, precision_bits);
    for &next in &values[1..] {
        let (d, next_tz) = nearest_delta(next.wrapping_sub(v), next, precision_bits, tz);
        tz = next_tz;
        v = v.wrapping_add(d);
        residuals.push(d);
    }
    Ok(())
}

/// Second-order residuals of `values[1..]` at `precision_bits`
///
/// The first residual is the exact first delta.
pub fn nearest_delta2_residuals(residuals: &mut Vec<i64>, values: &[i64], precision_bits: u8) -> Result<()> {
    check_precision_bits(precision_bits)?;
    if values.is_empty() {
        return Err(CompressionError::EmptyBlock { codec: "nearest_delta2" });
    }

    if precision_bits == EXACT_PRECISION || values.len() < 3 {
        DeltaCodec::new(DeltaKind::Delta2).residuals(residuals, values);
        return Ok(());
    }

    let mut d1 = values[1].wrapping_sub(values[0]);
    residuals.push(d1);
    let mut v = values[1];
    let mut tz = trailing_zeros_for(v, precision_bits);
    for &next in &values[2..] {
        let exact = next.wrapping_sub(v).wrapping_sub(d1);
        let (d2, next_tz) = nearest_delta(exact, next, precision_bits, tz);
        tz = next_tz;
        d1 = d1.wrapping_add(d2);
        v = v.wrapping_add(d1);
        residuals.push(d2);
    }
    Ok(())
}

/// Append the first-order nearest-delta body of `values` to `dst`
///
/// Returns the first value.
pub fn marshal_nearest_delta(dst: &mut Vec<u8>, values: &[i64], precision_bits: u8) -> Result<i64> {
    let mut residuals = Vec::with_capacity(values.len().saturating_sub(1));
    nearest_delta_residuals(&mut residuals, values, precision_bits)?;
    marshal_var_int64s(dst, &residuals);
    Ok(values[0])
}

/// Append the second-order nearest-delta body of `values` to `dst`
///
/// Returns the first value.
pub fn marshal_nearest_delta2(dst: &mut Vec<u8>, values: &[i64], precision_bits: u8) -> Result<i64> {
    let mut residuals = Vec::with_capacity(values.len().saturating_sub(1));
    nearest_delta2_residuals(&mut residuals, values, precision_bits)?;
    marshal_var_int64s(dst, &residuals);
    Ok(values[0])
}

fn unmarshal_with(kind: DeltaKind, dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
    if count == 0 {
        return Err(CompressionError::EmptyBlock { codec: "nearest_delta" });
    }
    let mut residuals = Vec::with_capacity(count - 1);
    unmarshal_var_int64s_exact(&mut residuals, src, count - 1)?;
    DeltaCodec::new(kind).integrate(dst, first, &residuals);
    Ok(())
}

/// Decode a first-order nearest-delta body, appending `count` values
pub fn unmarshal_nearest_delta(dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
    unmarshal_with(DeltaKind::Delta, dst, src, first, count)
}

/// Decode a second-order nearest-delta body, appending `count` values
pub fn unmarshal_nearest_delta2(dst: &mut Vec<i64>, src: &[u8], first: i64, count: usize) -> Result<()> {
    unmarshal_with(DeltaKind::Delta2, dst, src, first, count)
}
