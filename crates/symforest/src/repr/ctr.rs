//! Counter (CTR) feature descriptors and their statistics tables.
//!
//! A CTR feature is computed per record by:
//!
//! 1. Folding the record's categorical hashes and a few binarized-feature
//!    predicates into a 64-bit combination key ([`CtrProjection::combination_key`]).
//! 2. Resolving the key to a bucket in a [`CtrValueTable`].
//! 3. Turning the bucket statistics into an estimate with the descriptor's
//!    prior, shift and scale ([`ModelCtr::calc`]).
//!
//! Several descriptors may share one projection (and thus one key); they are
//! grouped in a [`CtrGroup`].

use std::collections::HashMap;

/// Multiplier of the key folding function.
pub const CTR_HASH_MULTIPLIER: u64 = 0x4906_ba49_4954_cb65;

/// Fold `value` into the running combination key `acc`.
#[inline]
pub fn combine_hash(acc: u64, value: u64) -> u64 {
    CTR_HASH_MULTIPLIER.wrapping_mul(acc.wrapping_add(CTR_HASH_MULTIPLIER.wrapping_mul(value)))
}

// =============================================================================
// Projection
// =============================================================================

/// Predicate over one already-binarized feature byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinFeaturePredicate {
    /// Slot in the binarized feature vector.
    pub bin_index: u32,
    /// Test `byte == value` instead of `byte >= value`.
    pub check_value_equal: bool,
    pub value: u8,
}

impl BinFeaturePredicate {
    #[inline]
    fn eval(&self, bins: &[u8]) -> u64 {
        let byte = bins[self.bin_index as usize];
        if self.check_value_equal {
            (byte == self.value) as u64
        } else {
            (byte >= self.value) as u64
        }
    }
}

/// The inputs a CTR key is built from, in fold order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CtrProjection {
    /// Categorical slots whose hashes are folded first.
    pub cat_features: Vec<u32>,
    /// Binarized-feature predicates folded after the hashes.
    pub bin_predicates: Vec<BinFeaturePredicate>,
}

impl CtrProjection {
    /// Compute the combination key for one record.
    ///
    /// `bins` must already hold the numeric and one-hot portion of the
    /// binarized feature vector.
    #[inline]
    pub fn combination_key(&self, bins: &[u8], cat_hashes: &[i32]) -> u64 {
        let mut key = 0u64;
        for &cat in &self.cat_features {
            // Sign-extend: negative hashes fold as their 64-bit two's complement.
            key = combine_hash(key, cat_hashes[cat as usize] as i64 as u64);
        }
        for predicate in &self.bin_predicates {
            key = combine_hash(key, predicate.eval(bins));
        }
        key
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// How bucket statistics turn into a count pair for [`ModelCtr::calc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrKind {
    Borders,
    Buckets,
    BinarizedTargetMeanValue,
    FloatTargetMeanValue,
    Counter,
    FeatureFreq,
}

impl CtrKind {
    /// Kinds that read a per-class histogram from `totals`.
    pub fn uses_class_histogram(self) -> bool {
        matches!(self, CtrKind::Borders | CtrKind::Buckets)
    }

    /// Kinds that read `mean_history`.
    pub fn uses_mean_history(self) -> bool {
        matches!(
            self,
            CtrKind::BinarizedTargetMeanValue | CtrKind::FloatTargetMeanValue
        )
    }
}

/// One CTR feature: which table to read and how to smooth it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCtr {
    /// Identifies the [`CtrValueTable`] this descriptor reads.
    pub base_hash: u64,
    pub kind: CtrKind,
    pub target_border_idx: u32,
    pub prior_num: f32,
    pub prior_denom: f32,
    pub shift: f32,
    pub scale: f32,
}

impl ModelCtr {
    /// `((count_in_class + prior_num) / (total + prior_denom) + shift) * scale`.
    #[inline]
    pub fn calc(&self, count_in_class: f32, total: f32) -> f32 {
        let ctr = (count_in_class + self.prior_num) / (total + self.prior_denom);
        (ctr + self.shift) * self.scale
    }

    /// Estimate used when the combination key is not in the table.
    #[inline]
    pub fn default_estimate(&self) -> f32 {
        self.calc(0.0, 0.0)
    }
}

/// Descriptors sharing one projection.
#[derive(Debug, Clone, PartialEq)]
pub struct CtrGroup {
    pub projection: CtrProjection,
    pub ctrs: Vec<ModelCtr>,
}

// =============================================================================
// Value tables
// =============================================================================

/// Running mean statistics of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CtrMeanHistory {
    pub sum: f32,
    pub count: i32,
}

/// Learned statistics for one `base_hash`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CtrValueTable {
    /// Combination key -> bucket.
    pub index: HashMap<u64, u32>,
    /// Width of one bucket's class histogram in `totals`.
    pub target_classes_count: u32,
    pub counter_denominator: i32,
    pub mean_history: Vec<CtrMeanHistory>,
    pub totals: Vec<i32>,
}

impl CtrValueTable {
    #[inline]
    pub fn resolve(&self, key: u64) -> Option<usize> {
        self.index.get(&key).map(|&bucket| bucket as usize)
    }

    /// Class histogram of `bucket`, if it is inside `totals`.
    #[inline]
    fn class_histogram(&self, bucket: usize) -> Option<&[i32]> {
        let width = self.target_classes_count as usize;
        let start = bucket.checked_mul(width)?;
        self.totals.get(start..start.checked_add(width)?)
    }

    /// Estimate of `ctr` for the record whose combination key is `key`.
    ///
    /// Missing keys and buckets outside the table fall back to
    /// [`ModelCtr::default_estimate`].
    pub fn estimate(&self, ctr: &ModelCtr, key: u64) -> f32 {
        self.resolve(key)
            .and_then(|bucket| self.bucket_estimate(ctr, bucket))
            .unwrap_or_else(|| ctr.default_estimate())
    }

    fn bucket_estimate(&self, ctr: &ModelCtr, bucket: usize) -> Option<f32> {
        match ctr.kind {
            CtrKind::BinarizedTargetMeanValue | CtrKind::FloatTargetMeanValue => {
                let history = self.mean_history.get(bucket)?;
                Some(ctr.calc(history.sum, history.count as f32))
            }
            CtrKind::Counter | CtrKind::FeatureFreq => {
                let total = *self.totals.get(bucket)?;
                Some(ctr.calc(total as f32, self.counter_denominator as f32))
            }
            CtrKind::Buckets => {
                let histogram = self.class_histogram(bucket)?;
                let good = *histogram.get(ctr.target_border_idx as usize)?;
                let total: i32 = histogram.iter().sum();
                Some(ctr.calc(good as f32, total as f32))
            }
            CtrKind::Borders => {
                let histogram = self.class_histogram(bucket)?;
                if histogram.len() > 2 {
                    let split = (ctr.target_border_idx as usize + 1).min(histogram.len());
                    let (below, above) = histogram.split_at(split);
                    let good: i32 = above.iter().sum();
                    let total = below.iter().sum::<i32>() + good;
                    Some(ctr.calc(good as f32, total as f32))
                } else {
                    let (&neg, &pos) = (histogram.first()?, histogram.get(1)?);
                    Some(ctr.calc(pos as f32, (neg + pos) as f32))
                }
            }
        }
    }

    /// Number of buckets the table's statistics cover for `kind`.
    pub fn n_buckets(&self, kind: CtrKind) -> usize {
        if kind.uses_mean_history() {
            self.mean_history.len()
        } else if kind.uses_class_histogram() {
            match self.target_classes_count as usize {
                0 => 0,
                width => self.totals.len() / width,
            }
        } else {
            self.totals.len()
        }
    }
}

// =============================================================================
// ModelCtrs
// =============================================================================

/// All CTR descriptors of a model, with their tables resolved.
#[derive(Debug, Clone, Default)]
pub struct ModelCtrs {
    groups: Vec<CtrGroup>,
    tables: Vec<CtrValueTable>,
    /// `base_hash` of each entry of `tables`, ascending.
    base_hashes: Vec<u64>,
    /// Table position of every descriptor, in flattened (group, ctr) order.
    table_of: Vec<usize>,
}

impl ModelCtrs {
    /// Resolve every descriptor's `base_hash` to a table.
    ///
    /// Returns the first `base_hash` that has no table.
    pub fn new(
        groups: Vec<CtrGroup>,
        tables: HashMap<u64, CtrValueTable>,
    ) -> Result<Self, u64> {
        let mut positions: HashMap<u64, usize> = HashMap::with_capacity(tables.len());
        let mut table_list = Vec::with_capacity(tables.len());
        let mut base_hashes = Vec::with_capacity(tables.len());
        let mut sorted: Vec<_> = tables.into_iter().collect();
        sorted.sort_unstable_by_key(|(base_hash, _)| *base_hash);
        for (base_hash, table) in sorted {
            positions.insert(base_hash, table_list.len());
            table_list.push(table);
            base_hashes.push(base_hash);
        }

        let table_of = groups
            .iter()
            .flat_map(|group| group.ctrs.iter())
            .map(|ctr| positions.get(&ctr.base_hash).copied().ok_or(ctr.base_hash))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            groups,
            tables: table_list,
            base_hashes,
            table_of,
        })
    }

    /// Total number of CTR values produced per record.
    #[inline]
    pub fn n_ctrs(&self) -> usize {
        self.table_of.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table_of.is_empty()
    }

    #[inline]
    pub fn groups(&self) -> &[CtrGroup] {
        &self.groups
    }

    /// Table read by the `flat_idx`-th descriptor.
    #[inline]
    pub fn table_for(&self, flat_idx: usize) -> &CtrValueTable {
        &self.tables[self.table_of[flat_idx]]
    }

    /// Tables in ascending `base_hash` order.
    pub fn tables(&self) -> &[CtrValueTable] {
        &self.tables
    }

    /// `(base_hash, table)` pairs in ascending `base_hash` order.
    pub fn tables_with_hashes(&self) -> impl Iterator<Item = (u64, &CtrValueTable)> {
        self.base_hashes.iter().copied().zip(self.tables.iter())
    }

    /// Iterate descriptors in flattened order with their tables.
    pub fn ctrs_with_tables(&self) -> impl Iterator<Item = (&ModelCtr, &CtrValueTable)> {
        self.groups
            .iter()
            .flat_map(|group| group.ctrs.iter())
            .zip(self.table_of.iter())
            .map(|(ctr, &table)| (ctr, &self.tables[table]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctr(kind: CtrKind) -> ModelCtr {
        ModelCtr {
            base_hash: 1,
            kind,
            target_border_idx: 0,
            prior_num: 0.5,
            prior_denom: 1.0,
            shift: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn combine_hash_wraps() {
        assert_eq!(combine_hash(0, 0), 0);
        let expected = CTR_HASH_MULTIPLIER.wrapping_mul(CTR_HASH_MULTIPLIER);
        assert_eq!(combine_hash(0, 1), expected);
        // Order matters.
        assert_ne!(
            combine_hash(combine_hash(0, 1), 2),
            combine_hash(combine_hash(0, 2), 1)
        );
    }

    #[test]
    fn negative_hashes_sign_extend() {
        let projection = CtrProjection {
            cat_features: vec![0],
            bin_predicates: vec![],
        };
        let key = projection.combination_key(&[], &[-1]);
        assert_eq!(key, combine_hash(0, u64::MAX));
    }

    #[test]
    fn predicates_fold_after_hashes() {
        let projection = CtrProjection {
            cat_features: vec![1],
            bin_predicates: vec![
                BinFeaturePredicate {
                    bin_index: 0,
                    check_value_equal: false,
                    value: 2,
                },
                BinFeaturePredicate {
                    bin_index: 1,
                    check_value_equal: true,
                    value: 4,
                },
            ],
        };
        let key = projection.combination_key(&[3, 4], &[10, 20]);
        let expected = combine_hash(combine_hash(combine_hash(0, 20), 1), 1);
        assert_eq!(key, expected);

        let key = projection.combination_key(&[1, 5], &[10, 20]);
        let expected = combine_hash(combine_hash(combine_hash(0, 20), 0), 0);
        assert_eq!(key, expected);
    }

    #[test]
    fn missing_key_uses_prior() {
        let table = CtrValueTable::default();
        let c = ctr(CtrKind::Counter);
        assert_eq!(table.estimate(&c, 42), 0.5);
    }

    #[test]
    fn mean_value_estimate() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 0)]),
            mean_history: vec![CtrMeanHistory { sum: 3.0, count: 5 }],
            ..Default::default()
        };
        let c = ctr(CtrKind::FloatTargetMeanValue);
        assert_eq!(table.estimate(&c, 42), (3.0 + 0.5) / (5.0 + 1.0));
    }

    #[test]
    fn counter_uses_denominator() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 1)]),
            counter_denominator: 9,
            totals: vec![1, 4],
            ..Default::default()
        };
        let c = ctr(CtrKind::Counter);
        assert_eq!(table.estimate(&c, 42), (4.0 + 0.5) / (9.0 + 1.0));
    }

    #[test]
    fn binary_borders_estimate() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 1)]),
            target_classes_count: 2,
            totals: vec![9, 9, 3, 1],
            ..Default::default()
        };
        let c = ctr(CtrKind::Borders);
        assert_eq!(table.estimate(&c, 42), (1.0 + 0.5) / (4.0 + 1.0));
    }

    #[test]
    fn multiclass_borders_estimate() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 0)]),
            target_classes_count: 4,
            totals: vec![1, 2, 3, 4],
            ..Default::default()
        };
        let mut c = ctr(CtrKind::Borders);
        c.target_border_idx = 1;
        // good = classes 2,3 ; total = all classes
        assert_eq!(table.estimate(&c, 42), (7.0 + 0.5) / (10.0 + 1.0));
    }

    #[test]
    fn buckets_estimate() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 0)]),
            target_classes_count: 3,
            totals: vec![2, 5, 3],
            ..Default::default()
        };
        let mut c = ctr(CtrKind::Buckets);
        c.target_border_idx = 1;
        assert_eq!(table.estimate(&c, 42), (5.0 + 0.5) / (10.0 + 1.0));
    }

    #[test]
    fn out_of_range_bucket_falls_back() {
        let table = CtrValueTable {
            index: HashMap::from([(42, 7)]),
            target_classes_count: 2,
            totals: vec![1, 1],
            ..Default::default()
        };
        let c = ctr(CtrKind::Borders);
        assert_eq!(table.estimate(&c, 42), c.default_estimate());
    }

    #[test]
    fn model_ctrs_resolves_tables() {
        let group = CtrGroup {
            projection: CtrProjection::default(),
            ctrs: vec![ctr(CtrKind::Counter)],
        };
        let tables = HashMap::from([(1u64, CtrValueTable::default())]);
        let ctrs = ModelCtrs::new(vec![group.clone()], tables).unwrap();
        assert_eq!(ctrs.n_ctrs(), 1);

        let missing = ModelCtrs::new(vec![group], HashMap::new()).unwrap_err();
        assert_eq!(missing, 1);
    }
}
