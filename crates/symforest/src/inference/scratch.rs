//! Caller-owned reusable buffers for the scoring path.

use crate::repr::Model;

/// Per-worker scratch buffers.
///
/// A `Scratch` belongs to exactly one in-flight scoring call at a time; give
/// each thread its own. Buffers grow on first use and are then reused, so the
/// steady-state scoring path does not allocate.
///
/// Contents carry no meaning between calls: every call rewrites every slot
/// it reads.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    pub(crate) bins: Vec<u8>,
    pub(crate) cat_hashes: Vec<i32>,
    pub(crate) ctr_values: Vec<f32>,
    /// `block_size` binarized vectors, back to back.
    pub(crate) block_bins: Vec<u8>,
    pub(crate) block_sums: Vec<f64>,
}

impl Scratch {
    /// Empty buffers; they are sized on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers sized for `model` and blocks of `block_size` records.
    pub fn for_model(model: &Model, block_size: usize) -> Self {
        let mut scratch = Self::new();
        scratch.prepare(model);
        scratch.prepare_block(model, block_size);
        scratch
    }

    /// Size the single-record buffers for `model`.
    #[inline]
    pub fn prepare(&mut self, model: &Model) {
        self.bins.resize(model.binary_feature_count(), 0);
        self.cat_hashes.resize(model.cat_feature_count(), 0);
        self.ctr_values.resize(model.n_ctrs(), 0.0);
    }

    /// Size the block buffers for `n_rows` records of `model`.
    #[inline]
    pub(crate) fn prepare_block(&mut self, model: &Model, n_rows: usize) {
        self.block_bins.resize(n_rows * model.binary_feature_count(), 0);
        self.block_sums.resize(n_rows, 0.0);
    }

    /// Binarized feature vector of the last single-record call.
    #[inline]
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// CTR values of the last single-record call.
    #[inline]
    pub fn ctr_values(&self) -> &[f32] {
        &self.ctr_values
    }
}
