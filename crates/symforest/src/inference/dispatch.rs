//! Runtime strategy selection.

use ndarray::{Array1, ArrayView2};

use crate::config::{ScorerConfig, Strategy};
use crate::repr::Model;
use crate::utils::{Parallelism, run_with_threads};

use super::scorer::{ScoreError, Scorer};
use super::scratch::Scratch;
#[cfg(feature = "simd")]
use super::simd::SimdTraversal;
use super::traversal::{ScalarTraversal, UnrolledTraversal};

#[derive(Debug, Clone)]
enum Inner<'m> {
    Scalar(Scorer<'m, ScalarTraversal>),
    Unrolled(Scorer<'m, UnrolledTraversal>),
    #[cfg(feature = "simd")]
    Simd(Scorer<'m, SimdTraversal>),
}

macro_rules! dispatch {
    ($inner:expr, $scorer:ident => $body:expr) => {
        match $inner {
            Inner::Scalar($scorer) => $body,
            Inner::Unrolled($scorer) => $body,
            #[cfg(feature = "simd")]
            Inner::Simd($scorer) => $body,
        }
    };
}

/// A [`Scorer`] whose strategy is chosen from a [`ScorerConfig`] at runtime.
///
/// # Example
///
/// ```
/// use symforest::config::{ScorerConfig, Strategy};
/// use symforest::inference::AnyScorer;
/// use symforest::repr::Model;
///
/// let model = Model::builder().float_feature(vec![0.5]).bias(1.5).build().unwrap();
/// let config = ScorerConfig::builder().strategy(Strategy::Scalar).build().unwrap();
/// let scorer = AnyScorer::new(&model, &config);
/// assert_eq!(scorer.score(&[0.0], &mut scorer.new_scratch()), 1.5);
/// ```
#[derive(Debug, Clone)]
pub struct AnyScorer<'m> {
    inner: Inner<'m>,
    config: ScorerConfig,
}

impl<'m> AnyScorer<'m> {
    /// Build the scorer `config` asks for.
    ///
    /// A strategy that is not compiled in falls back to
    /// [`Strategy::Unrolled`] with a warning.
    pub fn new(model: &'m Model, config: &ScorerConfig) -> Self {
        let strategy = if config.strategy.is_available() {
            config.strategy
        } else {
            tracing::warn!(
                requested = %config.strategy,
                "strategy not available in this build, using unrolled"
            );
            Strategy::Unrolled
        };

        let block_size = config.block_size;
        let inner = match strategy {
            Strategy::Scalar => Inner::Scalar(Scorer::new(model).with_block_size(block_size)),
            #[cfg(feature = "simd")]
            Strategy::Simd => Inner::Simd(Scorer::new(model).with_block_size(block_size)),
            _ => Inner::Unrolled(Scorer::new(model).with_block_size(block_size)),
        };

        let mut config = config.clone();
        config.strategy = strategy;
        Self { inner, config }
    }

    /// Strategy actually in use.
    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn model(&self) -> &'m Model {
        dispatch!(&self.inner, s => s.model())
    }

    pub fn new_scratch(&self) -> Scratch {
        dispatch!(&self.inner, s => s.new_scratch())
    }

    pub fn try_score(&self, record: &[f32], scratch: &mut Scratch) -> Result<f64, ScoreError> {
        dispatch!(&self.inner, s => s.try_score(record, scratch))
    }

    pub fn score(&self, record: &[f32], scratch: &mut Scratch) -> f64 {
        dispatch!(&self.inner, s => s.score(record, scratch))
    }

    pub fn score_hashed(
        &self,
        floats: &[f32],
        hashes: &[i32],
        scratch: &mut Scratch,
    ) -> Result<f64, ScoreError> {
        dispatch!(&self.inner, s => s.score_hashed(floats, hashes, scratch))
    }

    pub fn score_batch(&self, records: &[f32], out: &mut [f64], scratch: &mut Scratch) {
        dispatch!(&self.inner, s => s.score_batch(records, out, scratch))
    }

    pub fn par_score_batch(&self, records: &[f32], out: &mut [f64], parallelism: Parallelism) {
        dispatch!(&self.inner, s => s.par_score_batch(records, out, parallelism))
    }

    pub fn score_array(&self, features: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f64> {
        dispatch!(&self.inner, s => s.score_array(features, parallelism))
    }

    /// Score a flat batch with the configured parallelism and thread count.
    pub fn score_all(&self, records: &[f32], out: &mut [f64]) -> Result<(), rayon::ThreadPoolBuildError> {
        let parallelism = self.config.parallelism;
        if !parallelism.is_parallel() {
            self.par_score_batch(records, out, Parallelism::Sequential);
            return Ok(());
        }
        run_with_threads(self.config.thread_count(), |parallelism| {
            self.par_score_batch(records, out, parallelism)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::repr::ObliviousSplit;

    fn model() -> Model {
        Model::builder()
            .float_feature(vec![0.5, 1.5])
            .tree(
                vec![ObliviousSplit {
                    feature: 0,
                    border: 2,
                    xor_mask: 0,
                }],
                vec![-1.0, 4.0],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn strategies_agree() {
        let model = model();
        let records: Vec<f32> = (0..50).map(|i| i as f32 * 0.1).collect();
        let mut results = Vec::new();
        for strategy in [Strategy::Scalar, Strategy::Unrolled, Strategy::Simd] {
            let config = ScorerConfig::builder().strategy(strategy).build().unwrap();
            let scorer = AnyScorer::new(&model, &config);
            let mut out = vec![0.0; 50];
            scorer.score_batch(&records, &mut out, &mut scorer.new_scratch());
            results.push(out);
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn reports_effective_strategy() {
        let model = model();
        let config = ScorerConfig::builder().strategy(Strategy::Simd).build().unwrap();
        let scorer = AnyScorer::new(&model, &config);
        if cfg!(feature = "simd") {
            assert_eq!(scorer.strategy(), Strategy::Simd);
        } else {
            assert_eq!(scorer.strategy(), Strategy::Unrolled);
        }
    }

    #[test]
    fn score_all_with_threads() {
        let model = model();
        let records: Vec<f32> = (0..500).map(|i| (i % 30) as f32 * 0.1).collect();
        let config = ScorerConfig::builder()
            .parallelism(Parallelism::Parallel)
            .n_threads(NonZeroUsize::new(2).unwrap())
            .block_size(16)
            .build()
            .unwrap();
        let scorer = AnyScorer::new(&model, &config);
        let mut out = vec![0.0; 500];
        scorer.score_all(&records, &mut out).unwrap();

        let mut scratch = scorer.new_scratch();
        for (record, &score) in records.iter().zip(&out) {
            assert_eq!(scorer.score(std::slice::from_ref(record), &mut scratch), score);
        }
    }
}
