//! Categorical hash tables and one-hot descriptors.

/// Hash used for categorical values that are missing or out of range.
///
/// No real category hashes to this value, so one-hot lookups against it
/// always yield 0.
pub const SENTINEL_HASH: i32 = i32::MAX;

/// Convert a raw categorical value to a category index.
///
/// The value is truncated toward zero. Returns `None` for NaN and negative
/// indexes.
#[inline]
pub fn float_to_category(value: f32) -> Option<usize> {
    if value.is_nan() {
        return None;
    }
    // `as` saturates, so infinities land far outside any table.
    let index = value as i64;
    usize::try_from(index).ok()
}

/// Category-index to hash table for one categorical input slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatFeature {
    hashes: Box<[i32]>,
}

impl CatFeature {
    pub fn new(hashes: Vec<i32>) -> Self {
        Self {
            hashes: hashes.into_boxed_slice(),
        }
    }

    /// Number of known categories.
    #[inline]
    pub fn n_categories(&self) -> usize {
        self.hashes.len()
    }

    #[inline]
    pub fn hashes(&self) -> &[i32] {
        &self.hashes
    }

    /// Hash of a raw categorical value, or [`SENTINEL_HASH`] when the value
    /// does not name a known category.
    #[inline]
    pub fn hash_of(&self, raw: f32) -> i32 {
        float_to_category(raw)
            .and_then(|idx| self.hashes.get(idx).copied())
            .unwrap_or(SENTINEL_HASH)
    }
}

/// One-hot binarization of a categorical slot.
///
/// Matching the slot's hash against position `k` of `hash_values` yields the
/// binarized value `k + 1`; no match yields 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotFeature {
    cat_feature: usize,
    hash_values: Box<[i32]>,
}

impl OneHotFeature {
    pub fn new(cat_feature: usize, hash_values: Vec<i32>) -> Self {
        Self {
            cat_feature,
            hash_values: hash_values.into_boxed_slice(),
        }
    }

    /// Index of the categorical slot this descriptor reads.
    #[inline]
    pub fn cat_feature(&self) -> usize {
        self.cat_feature
    }

    #[inline]
    pub fn hash_values(&self) -> &[i32] {
        &self.hash_values
    }

    /// 1-based position of the first matching hash, or 0.
    ///
    /// Hash lists are expected to be disjoint; if a hash repeats, the first
    /// occurrence wins.
    #[inline]
    pub fn binarize(&self, hash: i32) -> u8 {
        self.hash_values
            .iter()
            .position(|&h| h == hash)
            .map_or(0, |k| (k + 1) as u8)
    }
}
