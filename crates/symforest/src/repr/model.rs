//! The immutable scoring model and its builder.
//!
//! A [`Model`] bundles everything the scoring pipeline reads:
//!
//! - per-slot numeric [`Borders`]
//! - per-slot categorical hash tables ([`CatFeature`])
//! - one-hot descriptors ([`OneHotFeature`])
//! - CTR descriptors and value tables ([`ModelCtrs`]) with their borders
//! - the [`ObliviousForest`]
//! - global scale and bias
//!
//! # Binarized feature layout
//!
//! The binarized feature vector has `binary_feature_count` bytes, laid out as:
//!
//! 1. one byte per numeric slot with a non-empty border list, in slot order
//! 2. one byte per one-hot descriptor, in descriptor order
//! 3. one byte per CTR whose border list is non-empty, in CTR order
//!
//! Tree splits and CTR bin predicates address this vector.

use std::collections::HashMap;

use super::borders::{Borders, BordersError, MAX_BORDERS};
use super::categorical::{CatFeature, OneHotFeature};
use super::ctr::{CtrGroup, CtrKind, CtrValueTable, ModelCtr, ModelCtrs};
use super::forest::{ForestValidationError, ObliviousForest, ObliviousSplit};

// =============================================================================
// ModelValidationError
// =============================================================================

/// Structural invariant violations detected at load time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelValidationError {
    #[error("declared {declared} binary features, model layout implies {computed}")]
    BinaryFeatureCountMismatch { declared: usize, computed: usize },

    #[error("float feature {feature} has invalid borders: {error:?}")]
    FloatBorders { feature: usize, error: BordersError },

    #[error("ctr {ctr} has invalid borders: {error:?}")]
    CtrBorders { ctr: usize, error: BordersError },

    #[error("one-hot feature {one_hot} reads categorical slot {cat_feature}, model has {cat_feature_count}")]
    OneHotUnknownCatFeature {
        one_hot: usize,
        cat_feature: usize,
        cat_feature_count: usize,
    },

    #[error("one-hot feature {one_hot} has an empty hash list")]
    OneHotEmpty { one_hot: usize },

    #[error("one-hot feature {one_hot} has {len} hashes, maximum is {max}", max = MAX_BORDERS)]
    OneHotTooMany { one_hot: usize, len: usize },

    #[error("ctr projection {group} reads categorical slot {cat_feature}, model has {cat_feature_count}")]
    ProjectionUnknownCatFeature {
        group: usize,
        cat_feature: u32,
        cat_feature_count: usize,
    },

    #[error(
        "ctr projection {group} reads binary feature {bin_index}, \
         only the first {prefix} (numeric and one-hot) are available"
    )]
    ProjectionBinIndexOutOfRange {
        group: usize,
        bin_index: u32,
        prefix: usize,
    },

    #[error("ctr base hash {base_hash} has no value table")]
    MissingCtrTable { base_hash: u64 },

    #[error("ctr base hash {base_hash} has more than one value table")]
    DuplicateCtrTable { base_hash: u64 },

    #[error("ctr table {base_hash} lists key {key} more than once")]
    DuplicateCtrKey { base_hash: u64, key: u64 },

    #[error("ctr table {base_hash} maps a key to bucket {bucket}, table holds {n_buckets}")]
    CtrBucketOutOfRange {
        base_hash: u64,
        bucket: u32,
        n_buckets: usize,
    },

    #[error("ctr table {base_hash} has {target_classes_count} target classes, {kind:?} needs at least {min}")]
    InvalidClassCount {
        base_hash: u64,
        kind: CtrKind,
        target_classes_count: u32,
        min: u32,
    },

    #[error("ctr {ctr} has target border {target_border_idx}, table has {target_classes_count} classes")]
    TargetBorderOutOfRange {
        ctr: usize,
        target_border_idx: u32,
        target_classes_count: u32,
    },

    #[error("model has {n_ctrs} ctrs but {n_borders} ctr border lists")]
    CtrBordersCountMismatch { n_ctrs: usize, n_borders: usize },

    #[error("model has no bias")]
    EmptyBiases,

    #[error("scale {0} is not finite")]
    NonFiniteScale(f64),

    #[error("bias {index} ({value}) is not finite")]
    NonFiniteBias { index: usize, value: f64 },

    #[error(transparent)]
    Forest(#[from] ForestValidationError),
}

// =============================================================================
// Model
// =============================================================================

/// Immutable oblivious-forest scoring model.
///
/// Construct with [`ModelBuilder`] or load with [`crate::persist::read_json`].
/// A `Model` that exists has passed [`validate`](Model::validate).
#[derive(Debug, Clone)]
pub struct Model {
    float_borders: Vec<Borders>,
    cat_features: Vec<CatFeature>,
    one_hot: Vec<OneHotFeature>,
    ctrs: ModelCtrs,
    ctr_borders: Vec<Borders>,
    forest: ObliviousForest,
    scale: f64,
    biases: Vec<f64>,
    binary_feature_count: usize,
    /// First bin slot of the one-hot block.
    one_hot_offset: usize,
}

impl Model {
    /// Start building a model.
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// Number of numeric input slots (including unused ones).
    #[inline]
    pub fn float_feature_count(&self) -> usize {
        self.float_borders.len()
    }

    /// Number of categorical input slots.
    #[inline]
    pub fn cat_feature_count(&self) -> usize {
        self.cat_features.len()
    }

    /// Length of a raw input record: numeric slots followed by categorical slots.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.float_feature_count() + self.cat_feature_count()
    }

    /// Length of the binarized feature vector.
    #[inline]
    pub fn binary_feature_count(&self) -> usize {
        self.binary_feature_count
    }

    /// Number of CTR values computed per record.
    #[inline]
    pub fn n_ctrs(&self) -> usize {
        self.ctrs.n_ctrs()
    }

    #[inline]
    pub fn forest(&self) -> &ObliviousForest {
        &self.forest
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The bias added to every score (first entry of [`biases`](Self::biases)).
    #[inline]
    pub fn bias(&self) -> f64 {
        self.biases[0]
    }

    #[inline]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    #[inline]
    pub fn float_borders(&self) -> &[Borders] {
        &self.float_borders
    }

    #[inline]
    pub fn cat_features(&self) -> &[CatFeature] {
        &self.cat_features
    }

    #[inline]
    pub fn one_hot_features(&self) -> &[OneHotFeature] {
        &self.one_hot
    }

    #[inline]
    pub fn ctrs(&self) -> &ModelCtrs {
        &self.ctrs
    }

    #[inline]
    pub fn ctr_borders(&self) -> &[Borders] {
        &self.ctr_borders
    }

    /// First bin slot written by one-hot descriptors.
    #[inline]
    pub fn one_hot_offset(&self) -> usize {
        self.one_hot_offset
    }

    /// First bin slot written by CTRs; also the length of the prefix CTR
    /// predicates may read.
    #[inline]
    pub fn ctr_offset(&self) -> usize {
        self.one_hot_offset + self.one_hot.len()
    }

    /// Binary feature count implied by the border lists and descriptors.
    pub fn computed_binary_feature_count(&self) -> usize {
        let ctr_slots = self.ctr_borders.iter().filter(|b| !b.is_empty()).count();
        self.ctr_offset() + ctr_slots
    }

    /// Replace the forest, re-validating against this model's layout.
    pub fn with_forest(mut self, forest: ObliviousForest) -> Result<Self, ModelValidationError> {
        self.forest = forest;
        self.validate()?;
        Ok(self)
    }

    /// Check every structural invariant the scoring path relies on.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        let cat_feature_count = self.cat_features.len();

        for (one_hot, feature) in self.one_hot.iter().enumerate() {
            if feature.cat_feature() >= cat_feature_count {
                return Err(ModelValidationError::OneHotUnknownCatFeature {
                    one_hot,
                    cat_feature: feature.cat_feature(),
                    cat_feature_count,
                });
            }
            let len = feature.hash_values().len();
            if len == 0 {
                return Err(ModelValidationError::OneHotEmpty { one_hot });
            }
            if len > MAX_BORDERS {
                return Err(ModelValidationError::OneHotTooMany { one_hot, len });
            }
        }

        let prefix = self.ctr_offset();
        for (group_idx, group) in self.ctrs.groups().iter().enumerate() {
            let projection = &group.projection;
            if let Some(&cat_feature) = projection
                .cat_features
                .iter()
                .find(|&&cat| cat as usize >= cat_feature_count)
            {
                return Err(ModelValidationError::ProjectionUnknownCatFeature {
                    group: group_idx,
                    cat_feature,
                    cat_feature_count,
                });
            }
            if let Some(predicate) = projection
                .bin_predicates
                .iter()
                .find(|p| p.bin_index as usize >= prefix)
            {
                return Err(ModelValidationError::ProjectionBinIndexOutOfRange {
                    group: group_idx,
                    bin_index: predicate.bin_index,
                    prefix,
                });
            }
        }

        for (ctr_idx, (ctr, table)) in self.ctrs.ctrs_with_tables().enumerate() {
            validate_ctr_table(ctr_idx, ctr, table)?;
        }

        if self.ctr_borders.len() != self.ctrs.n_ctrs() {
            return Err(ModelValidationError::CtrBordersCountMismatch {
                n_ctrs: self.ctrs.n_ctrs(),
                n_borders: self.ctr_borders.len(),
            });
        }

        if self.biases.is_empty() {
            return Err(ModelValidationError::EmptyBiases);
        }
        if !self.scale.is_finite() {
            return Err(ModelValidationError::NonFiniteScale(self.scale));
        }
        if let Some((index, &value)) = self
            .biases
            .iter()
            .enumerate()
            .find(|(_, b)| !b.is_finite())
        {
            return Err(ModelValidationError::NonFiniteBias { index, value });
        }

        let computed = self.computed_binary_feature_count();
        if computed != self.binary_feature_count {
            return Err(ModelValidationError::BinaryFeatureCountMismatch {
                declared: self.binary_feature_count,
                computed,
            });
        }

        self.forest.validate(self.binary_feature_count)?;
        Ok(())
    }
}

fn validate_ctr_table(
    ctr_idx: usize,
    ctr: &ModelCtr,
    table: &CtrValueTable,
) -> Result<(), ModelValidationError> {
    let classes = table.target_classes_count;
    let min_classes = match ctr.kind {
        CtrKind::Borders => 2,
        CtrKind::Buckets => 1,
        _ => 0,
    };
    if classes < min_classes {
        return Err(ModelValidationError::InvalidClassCount {
            base_hash: ctr.base_hash,
            kind: ctr.kind,
            target_classes_count: classes,
            min: min_classes,
        });
    }

    // Borders needs a class above the target border, Buckets needs the class itself.
    let border_ok = match ctr.kind {
        CtrKind::Borders => ctr.target_border_idx < classes.saturating_sub(1),
        CtrKind::Buckets => ctr.target_border_idx < classes,
        _ => true,
    };
    if !border_ok {
        return Err(ModelValidationError::TargetBorderOutOfRange {
            ctr: ctr_idx,
            target_border_idx: ctr.target_border_idx,
            target_classes_count: classes,
        });
    }

    let n_buckets = table.n_buckets(ctr.kind);
    if let Some(&bucket) = table.index.values().find(|&&b| b as usize >= n_buckets) {
        return Err(ModelValidationError::CtrBucketOutOfRange {
            base_hash: ctr.base_hash,
            bucket,
            n_buckets,
        });
    }
    Ok(())
}

// =============================================================================
// ModelBuilder
// =============================================================================

/// Incremental construction of a [`Model`].
///
/// # Example
///
/// ```
/// use symforest::repr::{Model, ObliviousSplit};
///
/// let model = Model::builder()
///     .float_feature(vec![0.5])
///     .tree(
///         vec![ObliviousSplit { feature: 0, border: 1, xor_mask: 0 }],
///         vec![10.0, 20.0],
///     )
///     .build()
///     .unwrap();
/// assert_eq!(model.binary_feature_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    float_borders: Vec<Vec<f32>>,
    cat_features: Vec<Vec<i32>>,
    one_hot: Vec<(usize, Vec<i32>)>,
    ctr_groups: Vec<CtrGroup>,
    ctr_tables: HashMap<u64, CtrValueTable>,
    ctr_borders: Vec<Vec<f32>>,
    trees: Vec<(Vec<ObliviousSplit>, Vec<f32>)>,
    scale: f64,
    biases: Vec<f64>,
    binary_feature_count: Option<usize>,
    duplicate_table: Option<u64>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            float_borders: Vec::new(),
            cat_features: Vec::new(),
            one_hot: Vec::new(),
            ctr_groups: Vec::new(),
            ctr_tables: HashMap::new(),
            ctr_borders: Vec::new(),
            trees: Vec::new(),
            scale: 1.0,
            biases: vec![0.0],
            binary_feature_count: None,
            duplicate_table: None,
        }
    }

    /// Append a numeric slot. An empty border list marks the slot unused.
    pub fn float_feature(mut self, borders: Vec<f32>) -> Self {
        self.float_borders.push(borders);
        self
    }

    /// Append a categorical slot with its `category index -> hash` table.
    pub fn cat_feature(mut self, hashes: Vec<i32>) -> Self {
        self.cat_features.push(hashes);
        self
    }

    /// Append a one-hot descriptor over categorical slot `cat_feature`.
    pub fn one_hot(mut self, cat_feature: usize, hash_values: Vec<i32>) -> Self {
        self.one_hot.push((cat_feature, hash_values));
        self
    }

    pub fn ctr_group(mut self, group: CtrGroup) -> Self {
        self.ctr_groups.push(group);
        self
    }

    /// Add the value table for `base_hash`. Adding a second table for the
    /// same hash makes [`build`](Self::build) fail.
    pub fn ctr_table(mut self, base_hash: u64, table: CtrValueTable) -> Self {
        if self.ctr_tables.insert(base_hash, table).is_some() {
            self.duplicate_table.get_or_insert(base_hash);
        }
        self
    }

    /// Append the border list of the next CTR (in flattened group order).
    pub fn ctr_borders(mut self, borders: Vec<f32>) -> Self {
        self.ctr_borders.push(borders);
        self
    }

    pub fn tree(mut self, splits: Vec<ObliviousSplit>, leaf_values: Vec<f32>) -> Self {
        self.trees.push((splits, leaf_values));
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set a single bias.
    pub fn bias(mut self, bias: f64) -> Self {
        self.biases = vec![bias];
        self
    }

    pub fn biases(mut self, biases: Vec<f64>) -> Self {
        self.biases = biases;
        self
    }

    /// Declare the binary feature count the model file states.
    ///
    /// If never called, the count implied by the layout is used.
    pub fn binary_feature_count(mut self, count: usize) -> Self {
        self.binary_feature_count = Some(count);
        self
    }

    /// Assemble and validate the model.
    pub fn build(self) -> Result<Model, ModelValidationError> {
        self.assemble()
            .inspect_err(|error| tracing::debug!(%error, "model validation failed"))
    }

    fn assemble(self) -> Result<Model, ModelValidationError> {
        if let Some(base_hash) = self.duplicate_table {
            return Err(ModelValidationError::DuplicateCtrTable { base_hash });
        }
        let float_borders = self
            .float_borders
            .into_iter()
            .enumerate()
            .map(|(feature, b)| {
                Borders::new(b).map_err(|error| ModelValidationError::FloatBorders { feature, error })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ctr_borders = self
            .ctr_borders
            .into_iter()
            .enumerate()
            .map(|(ctr, b)| {
                Borders::new(b).map_err(|error| ModelValidationError::CtrBorders { ctr, error })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ctrs = ModelCtrs::new(self.ctr_groups, self.ctr_tables)
            .map_err(|base_hash| ModelValidationError::MissingCtrTable { base_hash })?;

        let mut forest = ObliviousForest::new();
        for (splits, leaf_values) in &self.trees {
            forest.push_tree(splits, leaf_values)?;
        }

        let one_hot_offset = float_borders.iter().filter(|b| !b.is_empty()).count();
        let mut model = Model {
            float_borders,
            cat_features: self.cat_features.into_iter().map(CatFeature::new).collect(),
            one_hot: self
                .one_hot
                .into_iter()
                .map(|(cat, hashes)| OneHotFeature::new(cat, hashes))
                .collect(),
            ctrs,
            ctr_borders,
            forest,
            scale: self.scale,
            biases: self.biases,
            binary_feature_count: 0,
            one_hot_offset,
        };
        model.binary_feature_count = self
            .binary_feature_count
            .unwrap_or_else(|| model.computed_binary_feature_count());

        model.validate()?;
        Ok(model)
    }
}
