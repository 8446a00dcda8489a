//! Model representation: borders, categorical tables, CTRs and the forest.
//!
//! Everything here is immutable once a [`Model`] is built. The scoring
//! pipeline in [`crate::inference`] only reads these types.

pub mod borders;
pub mod categorical;
pub mod ctr;
pub mod forest;
pub mod model;

pub use borders::{Borders, BordersError, MAX_BORDERS};
pub use categorical::{CatFeature, OneHotFeature, SENTINEL_HASH, float_to_category};
pub use ctr::{
    BinFeaturePredicate, CtrGroup, CtrKind, CtrMeanHistory, CtrProjection, CtrValueTable,
    ModelCtr, ModelCtrs, combine_hash,
};
pub use forest::{
    ForestValidationError, MAX_TREE_DEPTH, ObliviousForest, ObliviousSplit, TreeView,
};
pub use model::{Model, ModelBuilder, ModelValidationError};
