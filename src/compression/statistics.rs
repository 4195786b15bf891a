//! Block statistics used to classify a block before encoding
//!
//! Everything here is a pure function of the block. Nothing is used for
//! reconstruction, so these may change without breaking stored data.
//!
//! Hamming distances are normalized by the block length `N` (not `N - 1`),
//! so a block needs fewer than one changed bit per value on average to fall
//! under a distance of 1.0.

/// Zero-XOR pair share above which a block counts as repeating
pub const DEFAULT_REPEAT_RATIO: f64 = 0.9;

/// Mean popcount of the XOR of consecutive values
pub fn hamming_distance(values: &[i64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let bits: u64 = values
        .windows(2)
        .map(|w| (w[0] ^ w[1]).count_ones() as u64)
        .sum();
    bits as f64 / values.len() as f64
}

/// Hamming distance plus a repeat flag, at the default 0.9 ratio
pub fn complex_hamming_distance(values: &[i64]) -> (f64, bool) {
    complex_hamming_distance_with(values, DEFAULT_REPEAT_RATIO)
}

/// Hamming distance plus a repeat flag
///
/// The flag is set when more than `repeat_ratio * N` consecutive pairs are
/// identical. Identical pairs add no bits but stay in the `N` denominator:
/// averaging over changed pairs only would never drop below 1.0, leaving
/// no block with a distance under the nearest-delta2 threshold.
pub fn complex_hamming_distance_with(values: &[i64], repeat_ratio: f64) -> (f64, bool) {
    if values.len() <= 1 {
        return (0.0, false);
    }

    let mut bits = 0u64;
    let mut repeats = 0usize;
    for w in values.windows(2) {
        let xor = w[0] ^ w[1];
        if xor == 0 {
            repeats += 1;
        } else {
            bits += xor.count_ones() as u64;
        }
    }

    let n = values.len() as f64;
    (bits as f64 / n, repeats as f64 > repeat_ratio * n)
}

/// Share of consecutive pairs that are identical, over `N`
pub fn repeat_ratio(values: &[i64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let repeats = values.windows(2).filter(|w| w[0] == w[1]).count();
    repeats as f64 / values.len() as f64
}

/// Mean popcount of the XOR against a straight line from first to last value
pub fn delta_hamming_distance(values: &[i64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let n = values.len();
    let delta = values[n - 1].wrapping_sub(values[0]) / (n as i64 - 1);
    let mut reference = values[1];
    let mut bits = 0u64;
    for &v in &values[1..] {
        bits += (reference ^ v).count_ones() as u64;
        reference = reference.wrapping_add(delta);
    }
    bits as f64 / n as f64
}

/// Mean popcount of the XOR against a quadratic reference curve
///
/// The curve starts at the first value with the first delta and bends so its
/// final delta matches the block's last delta.
pub fn delta2_hamming_distance(values: &[i64]) -> f64 {
    match values.len() {
        0 | 1 => return 0.0,
        2 => return (values[0] ^ values[1]).count_ones() as f64,
        _ => {}
    }

    let n = values.len();
    let long_term = values[n - 1].wrapping_sub(values[n - 2]);
    let short_term = values[1].wrapping_sub(values[0]);
    let delta2 = if long_term != short_term {
        long_term.wrapping_sub(short_term) / (n as i64 - 2)
    } else {
        0
    };

    let mut reference = values[0];
    let mut delta = short_term;
    let mut bits = 0u64;
    for &v in values {
        bits += (reference ^ v).count_ones() as u64;
        reference = reference.wrapping_add(delta);
        delta = delta.wrapping_add(delta2);
    }
    bits as f64 / n as f64
}

/// Shannon entropy of the little-endian byte stream, in bits per byte
pub fn byte_entropy(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &v in values {
        for byte in v.to_le_bytes() {
            counts[byte as usize] += 1;
        }
    }

    let total = (values.len() * 8) as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Mean and population variance
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Moments {
    /// Arithmetic mean
    pub mean: f64,
    /// Population variance
    pub variance: f64,
}

impl Moments {
    fn of(samples: impl Iterator<Item = u32> + Clone) -> Self {
        let (count, sum) = samples.clone().fold((0usize, 0u64), |(n, s), x| (n + 1, s + x as u64));
        if count == 0 {
            return Self::default();
        }
        let mean = sum as f64 / count as f64;
        let variance = samples
            .map(|x| {
                let d = x as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;
        Self { mean, variance }
    }
}

/// Richer per-block profile for offline analysis and `marshal_best` tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct ExtendedStatistics {
    /// Popcount of consecutive XORs
    pub xor_popcount: Moments,
    /// Popcount of consecutive deltas
    pub delta_popcount: Moments,
    /// Leading zeros of consecutive deltas
    pub delta_leading_zeros: Moments,
    /// Trailing zeros of consecutive deltas (64 for a zero delta)
    pub delta_trailing_zeros: Moments,
    /// Identical consecutive pairs over `N`
    pub repeat_ratio: f64,
    /// Byte entropy in bits per byte
    pub byte_entropy: f64,
}

impl ExtendedStatistics {
    /// Profile `values`
    pub fn compute(values: &[i64]) -> Self {
        let xors = values.windows(2).map(|w| w[0] ^ w[1]);
        let deltas = values.windows(2).map(|w| w[1].wrapping_sub(w[0]));

        Self {
            xor_popcount: Moments::of(xors.map(|x| x.count_ones())),
            delta_popcount: Moments::of(deltas.clone().map(|d| d.count_ones())),
            delta_leading_zeros: Moments::of(deltas.clone().map(|d| d.leading_zeros())),
            delta_trailing_zeros: Moments::of(deltas.map(|d| d.trailing_zeros())),
            repeat_ratio: repeat_ratio(values),
            byte_entropy: byte_entropy(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[]), 0.0);
        assert_eq!(hamming_distance(&[7]), 0.0);
        assert_eq!(hamming_distance(&[5; 100]), 0.0);
        // 0 -> 1 -> 3: one bit, then one bit; over three values
        assert!((hamming_distance(&[0, 1, 3]) - 2.0 / 3.0).abs() < 1e-12);
        assert!((hamming_distance(&[0, -1]) - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_complex_matches_plain_distance() {
        let values: Vec<i64> = (0..500).map(|i| (i * i) % 97).collect();
        let (distance, _) = complex_hamming_distance(&values);
        assert!((distance - hamming_distance(&values)).abs() < 1e-12);
    }

    #[test]
    fn test_repeats_dilute_distance() {
        // Half the pairs repeat, the rest flip one bit
        let values: Vec<i64> = (0..400).map(|i| (i / 2) % 2).collect();
        let (distance, repeating) = complex_hamming_distance(&values);
        assert!(!repeating);
        assert!(distance < 0.5, "{}", distance);
        assert!(distance > 0.49, "{}", distance);
    }

    #[test]
    fn test_repeat_flag_threshold() {
        // 100 values, 91 identical pairs: 91 > 90
        let mut values = vec![1i64; 100];
        for i in (0..16).step_by(2) {
            values[i] = 2;
        }
        let repeats = values.windows(2).filter(|w| w[0] == w[1]).count();
        assert!(repeats < 91);
        assert!(!complex_hamming_distance(&values).1);

        let mut values = vec![1i64; 100];
        values[99] = 2;
        assert!(complex_hamming_distance(&values).1);
        assert!(!complex_hamming_distance_with(&values, 0.99).1);
    }

    #[test]
    fn test_repeat_ratio() {
        assert_eq!(repeat_ratio(&[1]), 0.0);
        assert!((repeat_ratio(&[1, 1, 1, 2]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_delta_distances_on_lines() {
        let line: Vec<i64> = (0..100).map(|i| 1_000 + i * 17).collect();
        assert_eq!(delta_hamming_distance(&line), 0.0);
        assert_eq!(delta2_hamming_distance(&line), 0.0);
        assert!(hamming_distance(&line) > 1.0);

        let parabola: Vec<i64> = (0..100).map(|i| i * i).collect();
        assert_eq!(delta2_hamming_distance(&parabola), 0.0);
        assert!(delta_hamming_distance(&parabola) > 0.0);
    }

    #[test]
    fn test_delta2_two_values() {
        assert_eq!(delta2_hamming_distance(&[0, 7]), 3.0);
    }

    #[test]
    fn test_byte_entropy_bounds() {
        assert_eq!(byte_entropy(&[]), 0.0);
        assert_eq!(byte_entropy(&[0; 64]), 0.0);
        let spread: Vec<i64> = (0..256).map(|i| i64::from_le_bytes([i as u8; 8])).collect();
        assert!((byte_entropy(&spread) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_extended_statistics() {
        let values: Vec<i64> = (0..64).map(|i| i * 8).collect();
        let stats = ExtendedStatistics::compute(&values);
        assert_eq!(stats.delta_popcount.mean, 1.0);
        assert_eq!(stats.delta_popcount.variance, 0.0);
        assert_eq!(stats.delta_trailing_zeros.mean, 3.0);
        assert_eq!(stats.delta_leading_zeros.mean, 60.0);
        assert_eq!(stats.repeat_ratio, 0.0);

        let empty = ExtendedStatistics::compute(&[1]);
        assert_eq!(empty.xor_popcount, Moments::default());
    }
}
