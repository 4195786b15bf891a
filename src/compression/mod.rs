//! Compression implementations
//!
//! This module provides the building blocks of the adaptive encoder:
//!
//! - **selector**: Classifies a block and dispatches to a scheme by tag
//! - **codecs**: Bit-packed XOR/predictor codecs and varint delta codecs
//! - **nearest_delta**: Precision-bounded delta residuals
//! - **general**: zstd and lz4 byte compressors used as the final stage
//! - **statistics**: Hamming distances and block profiles
//! - **parallel**: rayon fan-out over independent blocks

pub mod bit_stream;
pub mod codecs;
pub mod general;
pub mod metrics;
pub mod nearest_delta;
pub mod parallel;
pub mod pool;
pub mod predictor;
pub mod selector;
pub mod statistics;
pub mod varint;

pub use codecs::{all_codecs, Codec, CodecId};
pub use parallel::ParallelEncoder;
pub use selector::AdaptiveEncoder;
