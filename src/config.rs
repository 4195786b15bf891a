//! Configuration management for the block encoder
//!
//! TOML file support, environment variable overrides and defaults that match
//! the selector's stock thresholds.
//!
//! ```toml
//! [selector]
//! repeat_ratio_threshold = 0.9
//! delta2_distance_threshold = 1.0
//! delta_distance_threshold = 20.5
//! precision_bits = 64
//!
//! [backend]
//! kind = "zstd"
//! level = 0
//! ```

use crate::compression::general::BackendKind;
use crate::compression::selector::{validate_selector, SelectorConfig};
use crate::error::{CompressionError, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EncodingConfig {
    /// Block classification thresholds
    #[serde(default)]
    pub selector: SelectorConfig,

    /// General-purpose compressor stage
    #[serde(default)]
    pub backend: BackendConfig,

    /// Scratch buffer pooling
    #[serde(default)]
    pub pool: PoolConfig,

    /// Batch fan-out
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// General-purpose compressor configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Compressor applied to residual streams
    #[serde(default)]
    pub kind: BackendKind,

    /// Fixed compression level; 0 picks one from the block size
    #[serde(default)]
    pub level: i32,
}

/// Scratch pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Idle buffers retained per capacity class
    #[serde(default = "default_max_buffers_per_class")]
    pub max_buffers_per_class: usize,
}

/// Parallel encoding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParallelConfig {
    /// Smallest batch handed to the thread pool
    #[serde(default = "default_min_parallel_blocks")]
    pub min_parallel_blocks: usize,

    /// Worker threads for a dedicated pool (0 = rayon global pool)
    #[serde(default)]
    pub max_threads: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_max_buffers_per_class() -> usize { 16 }
fn default_min_parallel_blocks() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }

const MAX_ZSTD_LEVEL: i32 = 22;

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_buffers_per_class: default_max_buffers_per_class(),
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_parallel_blocks: default_min_parallel_blocks(),
            max_threads: 0,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl EncodingConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompressionError::Configuration(format!("Failed to read config file {}: {}", path, e)))?;

        toml::from_str(&contents)
            .map_err(|e| CompressionError::Configuration(format!("Failed to parse config file {}: {}", path, e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        // Selector
        if let Ok(bits) = std::env::var("SAC_PRECISION_BITS") {
            if let Ok(b) = bits.parse() {
                self.selector.precision_bits = b;
            }
        }
        if let Ok(ratio) = std::env::var("SAC_REPEAT_RATIO") {
            if let Ok(r) = ratio.parse() {
                self.selector.repeat_ratio_threshold = r;
            }
        }

        // Backend
        if let Ok(kind) = std::env::var("SAC_BACKEND") {
            if let Ok(k) = kind.parse() {
                self.backend.kind = k;
            }
        }
        if let Ok(level) = std::env::var("SAC_BACKEND_LEVEL") {
            if let Ok(l) = level.parse() {
                self.backend.level = l;
            }
        }

        // Monitoring
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_selector(&self.selector)?;

        if !(0..=MAX_ZSTD_LEVEL).contains(&self.backend.level) {
            return Err(CompressionError::Configuration(format!(
                "Backend level must be within [0, {}]; got {}",
                MAX_ZSTD_LEVEL, self.backend.level
            )));
        }

        if self.pool.max_buffers_per_class == 0 {
            return Err(CompressionError::Configuration(
                "Pool max_buffers_per_class must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CompressionError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| CompressionError::Configuration(format!("Failed to write config file {}: {}", path, e)))
    }
}
