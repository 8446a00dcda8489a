//! Schema types for model serialization.
//!
//! These types provide a stable serialization format independent of runtime types.
//! Schema types are separate from runtime types for:
//! - Forward/backward compatibility (schema can evolve independently)
//! - Validation during deserialization (the runtime [`Model`](crate::repr::Model)
//!   is only ever built through its validating builder)
//!
//! Optional sections (`cat_features`, `one_hot_features`, `ctrs`,
//! `ctr_borders`) may be omitted for purely numeric models.

use serde::{Deserialize, Serialize};

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

fn default_scale() -> f64 {
    1.0
}

fn default_biases() -> Vec<f64> {
    vec![0.0]
}

fn default_ctr_scale() -> f32 {
    1.0
}

/// Top-level model document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub format_version: u32,
    /// One border list per numeric input slot (empty = unused slot).
    pub float_borders: Vec<Vec<f32>>,
    #[serde(default)]
    pub cat_features: Vec<CatFeatureSchema>,
    #[serde(default)]
    pub one_hot_features: Vec<OneHotFeatureSchema>,
    #[serde(default)]
    pub ctrs: CtrsSchema,
    /// One border list per CTR, in flattened projection order.
    #[serde(default)]
    pub ctr_borders: Vec<Vec<f32>>,
    pub trees: Vec<TreeSchema>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_biases")]
    pub biases: Vec<f64>,
    /// Checked against the layout when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_feature_count: Option<usize>,
}

/// Category index to hash table of one categorical slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatFeatureSchema {
    pub hashes: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotFeatureSchema {
    pub cat_feature: usize,
    pub hash_values: Vec<i32>,
}

// =============================================================================
// CTR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CtrsSchema {
    #[serde(default)]
    pub projections: Vec<CtrProjectionSchema>,
    #[serde(default)]
    pub tables: Vec<CtrTableSchema>,
}

/// A projection and the CTR descriptors computed from its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrProjectionSchema {
    #[serde(default)]
    pub cat_features: Vec<u32>,
    #[serde(default)]
    pub binarized: Vec<BinPredicateSchema>,
    pub ctrs: Vec<CtrSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinPredicateSchema {
    pub bin_index: u32,
    #[serde(default)]
    pub check_value_equal: bool,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrKindSchema {
    Borders,
    Buckets,
    BinarizedTargetMeanValue,
    FloatTargetMeanValue,
    Counter,
    FeatureFreq,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CtrSchema {
    pub base_hash: u64,
    pub kind: CtrKindSchema,
    #[serde(default)]
    pub target_border_idx: u32,
    pub prior_num: f32,
    pub prior_denom: f32,
    #[serde(default)]
    pub shift: f32,
    #[serde(default = "default_ctr_scale")]
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanHistorySchema {
    pub sum: f32,
    pub count: i32,
}

/// Statistics table shared by all descriptors with the same `base_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrTableSchema {
    pub base_hash: u64,
    /// `(combination key, bucket)` pairs.
    pub index: Vec<(u64, u32)>,
    #[serde(default)]
    pub target_classes_count: u32,
    #[serde(default)]
    pub counter_denominator: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mean_history: Vec<MeanHistorySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<i32>,
}

// =============================================================================
// Trees
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSchema {
    pub feature: u32,
    pub border: u8,
    #[serde(default)]
    pub xor_mask: u8,
}

/// One oblivious tree: `depth` splits and `2^depth` leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSchema {
    pub splits: Vec<SplitSchema>,
    pub leaf_values: Vec<f64>,
}
