//! Raw record to binarized feature vector.
//!
//! The numeric portion counts borders below each value, the categorical
//! portion maps raw categories to hashes and matches them against one-hot
//! descriptors, and the CTR portion is delegated to [`CtrMaterializer`].
//! Every active slot is written on every call, so buffers never need clearing.

use std::marker::PhantomData;

use crate::repr::borders::{BORDER_LANES, Borders};
use crate::repr::Model;

use super::ctr::CtrMaterializer;
use super::scorer::ScoreError;
use super::scratch::Scratch;

// =============================================================================
// BorderCount
// =============================================================================

/// Strategy for counting the borders strictly below a value.
pub trait BorderCount: Clone + Copy + Default + Send + Sync + 'static {
    /// Number of borders `b` with `b < x`. NaN counts as below every border.
    fn count_below(borders: &Borders, x: f32) -> u8;
}

/// Early-exit scan over the ascending border list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBorderCount;

impl BorderCount for ScalarBorderCount {
    #[inline]
    fn count_below(borders: &Borders, x: f32) -> u8 {
        borders.as_slice().iter().take_while(|&&b| b < x).count() as u8
    }
}

/// Branchless count over the padded border array, one lane-sized chunk at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrolledBorderCount;

impl BorderCount for UnrolledBorderCount {
    #[inline]
    fn count_below(borders: &Borders, x: f32) -> u8 {
        let mut count = 0u32;
        for chunk in borders.padded().chunks_exact(BORDER_LANES) {
            for &b in chunk {
                count += (b < x) as u32;
            }
        }
        count as u8
    }
}

// =============================================================================
// FeatureBinarizer
// =============================================================================

/// Writes the binarized feature vector of one record.
#[derive(Debug, Clone)]
pub struct FeatureBinarizer<'m, B = UnrolledBorderCount> {
    model: &'m Model,
    /// Numeric slots with at least one border, in slot order.
    active_floats: Box<[usize]>,
    ctr: CtrMaterializer<'m>,
    _marker: PhantomData<B>,
}

impl<'m, B: BorderCount> FeatureBinarizer<'m, B> {
    pub fn new(model: &'m Model) -> Self {
        let active_floats = model
            .float_borders()
            .iter()
            .enumerate()
            .filter(|(_, borders)| !borders.is_empty())
            .map(|(slot, _)| slot)
            .collect();
        Self {
            model,
            active_floats,
            ctr: CtrMaterializer::new(model),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Binarize a raw record (numeric values then raw categorical values)
    /// into `scratch`.
    ///
    /// After this returns `Ok`, [`Scratch::bins`] holds the record's full
    /// binarized feature vector.
    pub fn binarize_record(&self, record: &[f32], scratch: &mut Scratch) -> Result<(), ScoreError> {
        let expected = self.model.n_features();
        if record.len() != expected {
            return Err(ScoreError::ShapeMismatch {
                expected,
                got: record.len(),
            });
        }
        scratch.prepare(self.model);

        let (floats, cats) = record.split_at(self.model.float_feature_count());
        self.hash_categories(cats, &mut scratch.cat_hashes);
        self.binarize_hashed(
            floats,
            &scratch.cat_hashes,
            &mut scratch.bins,
            &mut scratch.ctr_values,
        )
    }

    /// Map raw categorical values to their hashes; unknown categories map to
    /// [`SENTINEL_HASH`](crate::repr::SENTINEL_HASH).
    #[inline]
    pub(crate) fn hash_categories(&self, cats: &[f32], hashes: &mut [i32]) {
        for ((hash, feature), &raw) in hashes
            .iter_mut()
            .zip(self.model.cat_features())
            .zip(cats)
        {
            *hash = feature.hash_of(raw);
        }
    }

    /// Binarize a record whose categorical values are already hashed.
    ///
    /// `bins` receives the binarized feature vector and `ctr_values` the
    /// continuous CTR values.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is shorter than the model's binary feature count or
    /// `ctr_values` is shorter than its CTR count.
    pub fn binarize_hashed(
        &self,
        floats: &[f32],
        hashes: &[i32],
        bins: &mut [u8],
        ctr_values: &mut [f32],
    ) -> Result<(), ScoreError> {
        let model = self.model;
        if floats.len() != model.float_feature_count() || hashes.len() != model.cat_feature_count()
        {
            return Err(ScoreError::ShapeMismatch {
                expected: model.n_features(),
                got: floats.len() + hashes.len(),
            });
        }

        let float_borders = model.float_borders();
        for (bin, &slot) in bins.iter_mut().zip(self.active_floats.iter()) {
            *bin = B::count_below(&float_borders[slot], floats[slot]);
        }

        let one_hot_bins = &mut bins[model.one_hot_offset()..model.ctr_offset()];
        for (bin, one_hot) in one_hot_bins.iter_mut().zip(model.one_hot_features()) {
            *bin = one_hot.binarize(hashes[one_hot.cat_feature()]);
        }

        self.ctr.materialize::<B>(bins, hashes, ctr_values);
        Ok(())
    }
}
