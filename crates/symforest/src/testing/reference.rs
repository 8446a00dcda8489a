//! Naive reference scorer.
//!
//! Allocates per call and walks every structure in the most direct way. Used
//! as the oracle the optimized traversal strategies are checked against.

use crate::inference::SHAPE_MISMATCH_SCORE;
use crate::repr::{Model, combine_hash};

/// Straightforward scorer over a [`Model`].
#[derive(Debug, Clone, Copy)]
pub struct ReferenceScorer<'m> {
    model: &'m Model,
}

impl<'m> ReferenceScorer<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Binarize a raw record, or `None` if it has the wrong length.
    pub fn binarize(&self, record: &[f32]) -> Option<Vec<u8>> {
        let model = self.model;
        if record.len() != model.n_features() {
            return None;
        }
        let (floats, cats) = record.split_at(model.float_feature_count());
        let hashes: Vec<i32> = model
            .cat_features()
            .iter()
            .zip(cats)
            .map(|(feature, &raw)| feature.hash_of(raw))
            .collect();
        Some(self.binarize_hashed(floats, &hashes))
    }

    /// Binarize numeric values plus pre-hashed categoricals.
    pub fn binarize_hashed(&self, floats: &[f32], hashes: &[i32]) -> Vec<u8> {
        let model = self.model;
        let mut bins = Vec::with_capacity(model.binary_feature_count());

        for (borders, &x) in model.float_borders().iter().zip(floats) {
            if borders.is_empty() {
                continue;
            }
            let count = borders.as_slice().iter().filter(|&&b| x > b).count();
            bins.push(count as u8);
        }

        for one_hot in model.one_hot_features() {
            let hash = hashes[one_hot.cat_feature()];
            let position = one_hot.hash_values().iter().position(|&h| h == hash);
            bins.push(position.map_or(0, |p| p as u8 + 1));
        }

        let ctrs = model.ctrs();
        let mut ctr_values = Vec::with_capacity(ctrs.n_ctrs());
        let mut flat = 0;
        for group in ctrs.groups() {
            let mut key = 0u64;
            for &cat in &group.projection.cat_features {
                key = combine_hash(key, hashes[cat as usize] as i64 as u64);
            }
            for predicate in &group.projection.bin_predicates {
                let byte = bins[predicate.bin_index as usize];
                let hit = if predicate.check_value_equal {
                    byte == predicate.value
                } else {
                    byte >= predicate.value
                };
                key = combine_hash(key, hit as u64);
            }
            for ctr in &group.ctrs {
                ctr_values.push(ctrs.table_for(flat).estimate(ctr, key));
                flat += 1;
            }
        }

        for (borders, &value) in model.ctr_borders().iter().zip(&ctr_values) {
            if borders.is_empty() {
                continue;
            }
            let count = borders.as_slice().iter().filter(|&&b| value > b).count();
            bins.push(count as u8);
        }

        bins
    }

    /// Raw sum of the leaf values selected by `bins`.
    pub fn raw_sum(&self, bins: &[u8]) -> f64 {
        let mut sum = 0.0f64;
        for tree in self.model.forest().trees() {
            let mut index = 0usize;
            for level in 0..tree.depth() {
                let split = tree.split(level);
                let byte = bins[split.feature as usize] ^ split.xor_mask;
                if byte >= split.border {
                    index |= 1 << level;
                }
            }
            sum += tree.leaf_value(index) as f64;
        }
        sum
    }

    /// Score a raw record; wrong lengths score [`SHAPE_MISMATCH_SCORE`].
    pub fn score(&self, record: &[f32]) -> f64 {
        match self.binarize(record) {
            Some(bins) => self.model.scale() * self.raw_sum(&bins) + self.model.bias(),
            None => SHAPE_MISMATCH_SCORE,
        }
    }

    /// Score numeric values plus pre-hashed categoricals.
    pub fn score_hashed(&self, floats: &[f32], hashes: &[i32]) -> f64 {
        let bins = self.binarize_hashed(floats, hashes);
        self.model.scale() * self.raw_sum(&bins) + self.model.bias()
    }

    /// Score every record of a flat row-major buffer.
    pub fn score_all(&self, records: &[f32]) -> Vec<f64> {
        let width = self.model.n_features();
        if width == 0 {
            return Vec::new();
        }
        records.chunks_exact(width).map(|r| self.score(r)).collect()
    }
}
