//! symforest: a scoring engine for gradient-boosted oblivious tree ensembles.
//!
//! Scores CatBoost-style models (symmetric trees over binarized features,
//! with numeric borders, one-hot categoricals and counter (CTR) features)
//! one record at a time or in batches.
//!
//! # Key Types
//!
//! - [`Model`] / [`ModelBuilder`] - Immutable model and its validated construction
//! - [`Scorer`] - Compile-time strategy scorer; [`AnyScorer`] picks one at runtime
//! - [`ScorerConfig`] / [`Strategy`] - Runtime scorer configuration
//! - [`Scratch`] - Reusable per-thread buffers
//!
//! # Loading Models
//!
//! Use [`persist::read_json`] to load a model document.
//! See the [`persist`] module for the schema.
//!
//! # Scoring
//!
//! ```
//! use symforest::{AnyScorer, Model, ScorerConfig};
//! use symforest::repr::ObliviousSplit;
//!
//! let model = Model::builder()
//!     .float_feature(vec![0.5])
//!     .tree(vec![ObliviousSplit { feature: 0, border: 1, xor_mask: 0 }], vec![10.0, 20.0])
//!     .build()
//!     .unwrap();
//! let scorer = AnyScorer::new(&model, &ScorerConfig::default());
//! let mut scratch = scorer.new_scratch();
//!
//! assert_eq!(scorer.score(&[0.0], &mut scratch), 10.0);
//! assert_eq!(scorer.score(&[1.0], &mut scratch), 20.0);
//! assert_eq!(scorer.score(&[1.0, 2.0], &mut scratch), -1.0);
//! ```

// Re-export approx traits for users who want to compare scores
pub use approx;

pub mod config;
pub mod inference;
pub mod io;
pub mod persist;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Model types
pub use repr::{Model, ModelBuilder, ModelValidationError};

// Scoring
pub use inference::{AnyScorer, ScoreError, Scorer, Scratch};

// Configuration
pub use config::{ScorerConfig, Strategy};

// Shared utilities
pub use utils::{Parallelism, run_with_threads};
