//! Scorer configuration with builder pattern.
//!
//! [`ScorerConfig`] selects the scoring strategy and the batch/threading
//! knobs at runtime. It uses the `bon` crate for builder generation with
//! validation at build time.
//!
//! # Example
//!
//! ```
//! use symforest::config::{ScorerConfig, Strategy};
//! use symforest::Parallelism;
//!
//! // All defaults: unrolled traversal, 64-row blocks, sequential
//! let config = ScorerConfig::builder().build().unwrap();
//!
//! let config = ScorerConfig::builder()
//!     .strategy(Strategy::Scalar)
//!     .block_size(128)
//!     .parallelism(Parallelism::Parallel)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.block_size, 128);
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use bon::Builder;

use crate::inference::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::utils::Parallelism;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Block size must be in `1..=MAX_BLOCK_SIZE`.
    #[error("block_size must be in 1..={max}, got {got}")]
    InvalidBlockSize { got: usize, max: usize },
    /// Unknown strategy name.
    #[error("unknown strategy '{0}' (expected scalar, unrolled or simd)")]
    UnknownStrategy(String),
}

// =============================================================================
// Strategy
// =============================================================================

/// Inner-loop strategy used for binarization and tree evaluation.
///
/// All strategies produce the same scores (up to floating-point accumulation
/// order); they differ only in data access and vectorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Plain per-level loop, one record at a time.
    Scalar,
    /// Depth-specialized unrolled traversal with level-by-level block processing.
    #[default]
    Unrolled,
    /// Lane-vectorized border counting and 8-row tree evaluation.
    ///
    /// Falls back to [`Strategy::Unrolled`] when the crate is built without
    /// the `simd` feature.
    Simd,
}

impl Strategy {
    /// Whether this strategy is available in the current build.
    pub fn is_available(self) -> bool {
        match self {
            Strategy::Scalar | Strategy::Unrolled => true,
            Strategy::Simd => cfg!(feature = "simd"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Scalar => "scalar",
            Strategy::Unrolled => "unrolled",
            Strategy::Simd => "simd",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" => Ok(Strategy::Scalar),
            "unrolled" => Ok(Strategy::Unrolled),
            "simd" => Ok(Strategy::Simd),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

// =============================================================================
// ScorerConfig
// =============================================================================

/// Runtime configuration for [`AnyScorer`](crate::inference::AnyScorer).
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ScorerConfig {
    /// Inner-loop strategy. Default: `Unrolled`.
    #[builder(default)]
    pub strategy: Strategy,

    /// Number of records binarized and evaluated together in batch scoring.
    /// Default: 64.
    #[builder(default = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Threads for parallel batch scoring. `None` uses the global rayon pool.
    pub n_threads: Option<NonZeroUsize>,

    /// Whether batch scoring may run in parallel. Default: `Sequential`.
    #[builder(default)]
    pub parallelism: Parallelism,
}

impl<S: scorer_config_builder::IsComplete> ScorerConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBlockSize`] if `block_size` is zero or
    /// larger than [`MAX_BLOCK_SIZE`].
    pub fn build(self) -> Result<ScorerConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            n_threads: None,
            parallelism: Parallelism::Sequential,
        }
    }
}

impl ScorerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::InvalidBlockSize {
                got: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(())
    }

    /// Thread count in [`run_with_threads`](crate::run_with_threads) semantics
    /// (0 = global pool).
    pub fn thread_count(&self) -> usize {
        self.n_threads.map_or(0, NonZeroUsize::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScorerConfig::builder().build().unwrap();
        assert_eq!(config.strategy, Strategy::Unrolled);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.parallelism, Parallelism::Sequential);
        assert_eq!(config.thread_count(), 0);
    }

    #[test]
    fn rejects_zero_block_size() {
        let err = ScorerConfig::builder().block_size(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBlockSize { got: 0, .. }));
    }

    #[test]
    fn rejects_oversized_block() {
        let err = ScorerConfig::builder()
            .block_size(MAX_BLOCK_SIZE + 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBlockSize { .. }));
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Scalar".parse::<Strategy>().unwrap(), Strategy::Scalar);
        assert_eq!("SIMD".parse::<Strategy>().unwrap(), Strategy::Simd);
        assert!("avx512".parse::<Strategy>().is_err());
    }
}
