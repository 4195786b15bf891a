//! Round-trip and prefix-preservation tests for every exact codec
//!
//! Run with: cargo test --test codec_roundtrip
use sac_encoding::compression::codecs::{
    all_codecs, Codec, CodecId, GorillaCodec, GorillaLayout, RepeatEliminateCodec, MAX_ITEMS_14,
};
use sac_encoding::compression::varint::marshal_var_int64s;

fn shapes() -> Vec<(&'static str, Vec<i64>)> {
    vec![
        ("single", vec![42]),
        ("pair", vec![-1, 1]),
        ("scenario", vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0]),
        ("constant", vec![7; 1024]),
        ("timestamps", (0..2000).map(|i| 1_700_000_000_000 + i * 10_000).collect()),
        (
            "jittered",
            (0..2000).map(|i| 1_700_000_000_000 + i * 10_000 + (i * 7919) % 13).collect(),
        ),
        (
            "sine_bits",
            (0..1500)
                .map(|i| (100.0 + (i as f64 / 50.0).sin() * 10.0).to_bits() as i64)
                .collect(),
        ),
        ("steps", (0..3000).map(|i| (i / 100) as i64).collect()),
        ("extremes", vec![i64::MIN, i64::MAX, 0, -1, 1, i64::MAX, i64::MIN]),
        ("alternating", (0..500).map(|i| if i % 2 == 0 { 0 } else { -1 }).collect()),
    ]
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_every_codec_roundtrips() {
    for codec in all_codecs() {
        for (shape, values) in shapes() {
            let (body, first) = codec
                .compress(&values)
                .unwrap_or_else(|e| panic!("{} failed to compress {}: {}", codec.name(), shape, e));
            assert_eq!(first, values[0]);

            let decoded = codec
                .decompress(&body, first, values.len())
                .unwrap_or_else(|e| panic!("{} failed to decompress {}: {}", codec.name(), shape, e));
            assert_eq!(decoded, values, "{} round trip failed for {}", codec.name(), shape);
        }
    }
}

#[test]
fn test_gorilla_family_scenario() {
    let values = [1, 2, 3, 4, 5, 6, 7, 8, 9, 0];
    for layout in [GorillaLayout::Classic, GorillaLayout::GorillaZ, GorillaLayout::GorillaPlus] {
        let codec = GorillaCodec::new(layout);
        let (body, first) = codec.compress(&values).unwrap();
        let decoded = codec.decompress(&body, first, values.len()).unwrap();
        assert_eq!(decoded, values, "{:?}", layout);
    }
}

#[test]
fn test_constant_block_is_small() {
    let values = vec![123_456_789i64; 1024];
    for codec in all_codecs() {
        let (body, _) = codec.compress(&values).unwrap();
        assert!(body.len() < values.len() * 4, "{} used {} bytes", codec.name(), body.len());
    }
}

#[test]
fn test_registry_is_complete() {
    let names: Vec<&str> = all_codecs().iter().map(|c| c.name()).collect();
    assert_eq!(names.len(), CodecId::ALL.len());
    for id in CodecId::ALL {
        assert!(names.contains(&id.name()));
        assert_eq!(CodecId::from_byte(id as u8), Some(id));
    }
}

// =============================================================================
// Prefix preservation
// =============================================================================

#[test]
fn test_prefix_preserved() {
    let values: Vec<i64> = (0..300).map(|i| i * i - 1000).collect();
    for codec in all_codecs() {
        let (body, first) = codec.compress(&values).unwrap();

        let mut dst = vec![1, 2, 3, 4];
        codec.decompress_into(&mut dst, &body, first, values.len()).unwrap();
        assert_eq!(&dst[..4], &[1, 2, 3, 4], "{}", codec.name());
        assert_eq!(&dst[4..], values.as_slice(), "{}", codec.name());
    }
}

#[test]
fn test_prefix_untouched_on_count_mismatch() {
    let values: Vec<i64> = (0..64).collect();
    for codec in all_codecs() {
        let (body, first) = codec.compress(&values).unwrap();
        let mut dst = vec![1, 2, 3, 4];
        // Asking for more items than encoded must fail for every codec
        let result = codec.decompress_into(&mut dst, &body, first, values.len() + 1);
        assert!(result.is_err(), "{} decoded a phantom item", codec.name());
        assert_eq!(dst, vec![1, 2, 3, 4], "{}", codec.name());
    }
}

// =============================================================================
// Limits and run-length specifics
// =============================================================================

#[test]
fn test_count_header_limit() {
    let values = vec![0i64; MAX_ITEMS_14 + 1];
    let codec = GorillaCodec::new(GorillaLayout::Classic);
    assert!(codec.compress(&values).is_err());
    assert!(codec.compress(&values[..MAX_ITEMS_14]).is_ok());
}

#[test]
fn test_rle_overshooting_run_is_truncated() {
    // One pair claiming 100 repeats of 5
    let mut body = Vec::new();
    marshal_var_int64s(&mut body, &[2, 5, 100]);

    let codec = RepeatEliminateCodec::default();
    let decoded = codec.decompress(&body, 5, 10).unwrap();
    assert_eq!(decoded, vec![5; 10]);

    let mut dst = vec![1, 2, 3, 4];
    codec.decompress_into(&mut dst, &body, 5, 3).unwrap();
    assert_eq!(dst, vec![1, 2, 3, 4, 5, 5, 5]);
}

#[test]
fn test_rle_short_stream_rejected() {
    let mut body = Vec::new();
    marshal_var_int64s(&mut body, &[4, 5, 2, 6, 1]);

    let codec = RepeatEliminateCodec::default();
    let err = codec.decompress(&body, 5, 10).unwrap_err();
    assert!(err.to_string().contains("data is less than wanted"));
}
