//! Scoring pipeline for oblivious forest models.
//!
//! Control flow per record:
//!
//! ```text
//! raw record -> FeatureBinarizer -> CtrMaterializer -> TreeTraversal (all trees) -> scale/bias
//! ```
//!
//! # Module Structure
//!
//! - [`binarize`]: numeric and categorical binarization ([`FeatureBinarizer`])
//! - [`ctr`]: counter features ([`CtrMaterializer`])
//! - [`traversal`]: leaf index strategies ([`TreeTraversal`])
//! - [`simd`]: vectorized strategies (feature `simd`)
//! - [`scorer`]: the [`Scorer`] entry points and aggregation
//! - [`scratch`]: caller-owned buffers ([`Scratch`])
//! - [`dispatch`]: runtime strategy selection ([`AnyScorer`])
//!
//! # Quick Start
//!
//! ```
//! use symforest::inference::UnrolledScorer;
//! use symforest::repr::Model;
//!
//! let model = Model::builder().float_feature(vec![0.0]).bias(0.25).build().unwrap();
//! let scorer = UnrolledScorer::new(&model);
//! let mut scratch = scorer.new_scratch();
//!
//! let records = [1.0f32, -1.0, 2.0];
//! let mut scores = [0.0f64; 3];
//! scorer.score_batch(&records, &mut scores, &mut scratch);
//! assert_eq!(scores, [0.25; 3]);
//! ```

pub mod binarize;
pub mod ctr;
pub mod dispatch;
pub mod scorer;
pub mod scratch;
#[cfg(feature = "simd")]
pub mod simd;
pub mod traversal;

pub use binarize::{BorderCount, FeatureBinarizer, ScalarBorderCount, UnrolledBorderCount};
pub use ctr::CtrMaterializer;
pub use dispatch::AnyScorer;
pub use scorer::{
    DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, SHAPE_MISMATCH_SCORE, ScalarScorer, ScoreError, Scorer,
    UnrolledScorer,
};
#[cfg(feature = "simd")]
pub use scorer::SimdScorer;
pub use scratch::Scratch;
#[cfg(feature = "simd")]
pub use simd::{SimdBorderCount, SimdTraversal};
pub use traversal::{ScalarTraversal, TreeTraversal, UnrolledTraversal};
