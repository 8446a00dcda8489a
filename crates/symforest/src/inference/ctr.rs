//! CTR materialization: combination keys, table lookups, binarization.

use crate::repr::{Borders, Model, ModelCtrs};

use super::binarize::BorderCount;

/// Extends the binarized feature vector with one byte per bordered CTR.
#[derive(Debug, Clone, Copy)]
pub struct CtrMaterializer<'m> {
    ctrs: &'m ModelCtrs,
    borders: &'m [Borders],
    first_slot: usize,
}

impl<'m> CtrMaterializer<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            ctrs: model.ctrs(),
            borders: model.ctr_borders(),
            first_slot: model.ctr_offset(),
        }
    }

    /// Compute every CTR value into `ctr_values` and binarize them into the
    /// CTR block of `bins`.
    ///
    /// `bins` must already hold the numeric and one-hot prefix. All values
    /// are computed before any CTR byte is written, so keys only ever see the
    /// prefix. No-op for models without CTRs.
    pub fn materialize<B: BorderCount>(&self, bins: &mut [u8], hashes: &[i32], ctr_values: &mut [f32]) {
        if self.ctrs.is_empty() {
            return;
        }

        let mut flat = 0;
        for group in self.ctrs.groups() {
            let key = group.projection.combination_key(bins, hashes);
            for ctr in &group.ctrs {
                ctr_values[flat] = self.ctrs.table_for(flat).estimate(ctr, key);
                flat += 1;
            }
        }

        let mut slot = self.first_slot;
        for (&value, borders) in ctr_values.iter().zip(self.borders) {
            if borders.is_empty() {
                continue;
            }
            bins[slot] = B::count_below(borders, value);
            slot += 1;
        }
    }
}
