//! Oblivious forest scorer.
//!
//! [`Scorer`] runs the full pipeline for one model: binarization, CTR
//! materialization, tree traversal and aggregation
//! (`scale * sum(leaf values) + bias`). It is generic over a
//! [`TreeTraversal`] strategy, which also selects the border counting used
//! by the binarizer.
//!
//! # Block Processing
//!
//! Batch scoring binarizes `block_size` records into one buffer, then walks
//! each tree over the whole block. This keeps a tree's splits and leaves
//! hot while all rows of the block are evaluated. The default block size is
//! 64 rows. Use [`Scorer::with_block_size`] to change it.
//!
//! # Example
//!
//! ```
//! use symforest::inference::UnrolledScorer;
//! use symforest::repr::{Model, ObliviousSplit};
//!
//! let model = Model::builder()
//!     .float_feature(vec![0.5])
//!     .tree(vec![ObliviousSplit { feature: 0, border: 1, xor_mask: 0 }], vec![10.0, 20.0])
//!     .build()
//!     .unwrap();
//!
//! let scorer = UnrolledScorer::new(&model);
//! let mut scratch = scorer.new_scratch();
//! assert_eq!(scorer.score(&[0.0], &mut scratch), 10.0);
//! assert_eq!(scorer.score(&[1.0], &mut scratch), 20.0);
//! assert_eq!(scorer.score(&[1.0, 2.0], &mut scratch), -1.0);
//! ```

use std::marker::PhantomData;

use ndarray::{Array1, ArrayView2};

use crate::repr::Model;
use crate::utils::Parallelism;

use super::binarize::FeatureBinarizer;
use super::scratch::Scratch;
use super::traversal::{ScalarTraversal, TreeTraversal, UnrolledTraversal};

/// Default block size for batch scoring.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Largest block size; block traversal keeps one index per row on the stack.
pub const MAX_BLOCK_SIZE: usize = 256;

/// Score returned for records of the wrong length.
pub const SHAPE_MISMATCH_SCORE: f64 = -1.0;

/// Why a record could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("record has {got} features, model expects {expected}")]
    ShapeMismatch { expected: usize, got: usize },
}

// =============================================================================
// Scorer
// =============================================================================

/// Scorer with the plain per-level loop.
pub type ScalarScorer<'m> = Scorer<'m, ScalarTraversal>;

/// Scorer with depth-specialized block traversal (the default strategy).
pub type UnrolledScorer<'m> = Scorer<'m, UnrolledTraversal>;

/// Scorer with 8-row vectorized traversal.
#[cfg(feature = "simd")]
pub type SimdScorer<'m> = Scorer<'m, super::simd::SimdTraversal>;

/// Scores records against one [`Model`] with traversal strategy `T`.
///
/// The scorer only borrows the model and holds no mutable state, so it can
/// be shared across threads. Per-call state lives in a [`Scratch`] that each
/// thread owns.
#[derive(Debug, Clone)]
pub struct Scorer<'m, T: TreeTraversal = UnrolledTraversal> {
    model: &'m Model,
    binarizer: FeatureBinarizer<'m, T::Borders>,
    block_size: usize,
    _traversal: PhantomData<T>,
}

impl<'m, T: TreeTraversal> Scorer<'m, T> {
    /// Create a scorer with the default block size.
    pub fn new(model: &'m Model) -> Self {
        tracing::debug!(
            strategy = T::NAME,
            trees = model.forest().n_trees(),
            binary_features = model.binary_feature_count(),
            ctrs = model.n_ctrs(),
            "scorer created"
        );
        Self {
            model,
            binarizer: FeatureBinarizer::new(model),
            block_size: DEFAULT_BLOCK_SIZE,
            _traversal: PhantomData,
        }
    }

    /// Set the batch block size, clamped to `1..=MAX_BLOCK_SIZE`.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.clamp(1, MAX_BLOCK_SIZE);
        self
    }

    #[inline]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn binarizer(&self) -> &FeatureBinarizer<'m, T::Borders> {
        &self.binarizer
    }

    /// Scratch buffers sized for this scorer.
    pub fn new_scratch(&self) -> Scratch {
        Scratch::for_model(self.model, self.block_size)
    }

    #[inline]
    fn aggregate(&self, sum: f64) -> f64 {
        self.model.scale() * sum + self.model.bias()
    }

    /// Sum of leaf values for the binarized vector in `bins`.
    #[inline]
    fn sum_trees(&self, bins: &[u8]) -> f64 {
        self.model
            .forest()
            .trees()
            .map(|tree| tree.leaf_values[T::leaf_index(&tree, bins)] as f64)
            .sum()
    }

    // =========================================================================
    // Single record
    // =========================================================================

    /// Score one raw record.
    pub fn try_score(&self, record: &[f32], scratch: &mut Scratch) -> Result<f64, ScoreError> {
        self.binarizer.binarize_record(record, scratch)?;
        Ok(self.aggregate(self.sum_trees(&scratch.bins)))
    }

    /// Score one raw record, returning [`SHAPE_MISMATCH_SCORE`] if its length
    /// does not match the model.
    #[inline]
    pub fn score(&self, record: &[f32], scratch: &mut Scratch) -> f64 {
        self.try_score(record, scratch)
            .unwrap_or(SHAPE_MISMATCH_SCORE)
    }

    /// Score a record whose categorical values are already hashed.
    pub fn score_hashed(
        &self,
        floats: &[f32],
        hashes: &[i32],
        scratch: &mut Scratch,
    ) -> Result<f64, ScoreError> {
        scratch.prepare(self.model);
        self.binarizer
            .binarize_hashed(floats, hashes, &mut scratch.bins, &mut scratch.ctr_values)?;
        Ok(self.aggregate(self.sum_trees(&scratch.bins)))
    }

    // =========================================================================
    // Batch
    // =========================================================================

    /// Number of records in `records` that can be scored into `out`.
    ///
    /// Writes the sentinel to every output past that count.
    fn complete_records(&self, records: &[f32], out: &mut [f64]) -> usize {
        let n_features = self.model.n_features();
        let n_complete = match n_features {
            0 => out.len(),
            n => out.len().min(records.len() / n),
        };
        out[n_complete..].fill(SHAPE_MISMATCH_SCORE);
        n_complete
    }

    /// Score a flat row-major batch into `out`, one score per record.
    ///
    /// `records` holds `out.len()` records of `n_features` values. Records
    /// that the buffer cannot supply completely get [`SHAPE_MISMATCH_SCORE`];
    /// values past `out.len()` records are ignored.
    pub fn score_batch(&self, records: &[f32], out: &mut [f64], scratch: &mut Scratch) {
        let n_complete = self.complete_records(records, out);
        let n_features = self.model.n_features();
        let out = &mut out[..n_complete];

        if n_features == 0 {
            // Every record is empty and scores the same.
            let score = self.score(&[], scratch);
            out.fill(score);
            return;
        }

        let records = &records[..n_complete * n_features];
        if T::USES_BLOCK_OPTIMIZATION {
            let blocks = records.chunks(self.block_size * n_features);
            for (block, out_block) in blocks.zip(out.chunks_mut(self.block_size)) {
                self.score_block(block, out_block, scratch);
            }
        } else {
            for (record, score) in records.chunks_exact(n_features).zip(out.iter_mut()) {
                *score = self.score(record, scratch);
            }
        }
    }

    /// Binarize a whole block, then accumulate tree by tree.
    fn score_block(&self, records: &[f32], out: &mut [f64], scratch: &mut Scratch) {
        let model = self.model;
        let n_features = model.n_features();
        let n_floats = model.float_feature_count();
        let stride = model.binary_feature_count();
        let n_rows = out.len();

        scratch.prepare(model);
        scratch.prepare_block(model, n_rows);

        let rows = records.chunks_exact(n_features);
        let row_bins = scratch.block_bins.chunks_exact_mut(stride.max(1));
        for (record, bins) in rows.zip(row_bins) {
            let (floats, cats) = record.split_at(n_floats);
            self.binarizer.hash_categories(cats, &mut scratch.cat_hashes);
            let binarized = self.binarizer.binarize_hashed(
                floats,
                &scratch.cat_hashes,
                &mut bins[..stride],
                &mut scratch.ctr_values,
            );
            debug_assert!(binarized.is_ok(), "block row lengths come from the model");
        }

        let sums = &mut scratch.block_sums[..n_rows];
        sums.fill(0.0);
        for tree in model.forest().trees() {
            T::accumulate_block(&tree, &scratch.block_bins, stride, sums);
        }

        for (score, &sum) in out.iter_mut().zip(sums.iter()) {
            *score = self.aggregate(sum);
        }
    }

    /// [`score_batch`](Self::score_batch) with blocks scored on the rayon
    /// pool when `parallelism` allows.
    ///
    /// Each worker allocates its own [`Scratch`] once.
    pub fn par_score_batch(&self, records: &[f32], out: &mut [f64], parallelism: Parallelism) {
        let n_complete = self.complete_records(records, out);
        let n_features = self.model.n_features();
        let out = &mut out[..n_complete];

        if n_features == 0 || !parallelism.is_parallel() {
            let mut scratch = self.new_scratch();
            self.score_batch(&records[..n_complete * n_features], out, &mut scratch);
            return;
        }

        let records = &records[..n_complete * n_features];
        let blocks: Vec<_> = records
            .chunks(self.block_size * n_features)
            .zip(out.chunks_mut(self.block_size))
            .collect();
        parallelism.maybe_par_for_each_init(
            blocks,
            || self.new_scratch(),
            |scratch, (block, out_block)| self.score_batch(block, out_block, scratch),
        );
    }

    /// Score every row of a 2D `(n_records, n_features)` array.
    ///
    /// Returns [`SHAPE_MISMATCH_SCORE`] for every row if the column count does
    /// not match the model.
    pub fn score_array(&self, features: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f64> {
        let (n_rows, n_cols) = features.dim();
        if n_cols != self.model.n_features() {
            return Array1::from_elem(n_rows, SHAPE_MISMATCH_SCORE);
        }

        let contiguous = features.as_standard_layout();
        let data = contiguous
            .as_slice()
            .expect("standard layout arrays are contiguous");
        let mut out = Array1::zeros(n_rows);
        let out_slice = out
            .as_slice_mut()
            .expect("freshly allocated arrays are contiguous");
        self.par_score_batch(data, out_slice, parallelism);
        out
    }
}
