//! Conversion between runtime types and schema types.
//!
//! Schema -> runtime goes through [`ModelBuilder`], so every loaded model is
//! validated. Runtime -> schema is lossless.

use std::collections::HashMap;

use super::error::ReadError;
use super::schema::{
    BinPredicateSchema, CatFeatureSchema, CtrKindSchema, CtrProjectionSchema, CtrSchema,
    CtrTableSchema, CtrsSchema, FORMAT_VERSION, MeanHistorySchema, ModelSchema,
    OneHotFeatureSchema, SplitSchema, TreeSchema,
};
use crate::repr::{
    BinFeaturePredicate, CtrGroup, CtrKind, CtrMeanHistory, CtrProjection, CtrValueTable, Model,
    ModelCtr, ModelValidationError, ObliviousSplit,
};

// =============================================================================
// Leaf conversions
// =============================================================================

impl From<CtrKindSchema> for CtrKind {
    fn from(kind: CtrKindSchema) -> Self {
        match kind {
            CtrKindSchema::Borders => Self::Borders,
            CtrKindSchema::Buckets => Self::Buckets,
            CtrKindSchema::BinarizedTargetMeanValue => Self::BinarizedTargetMeanValue,
            CtrKindSchema::FloatTargetMeanValue => Self::FloatTargetMeanValue,
            CtrKindSchema::Counter => Self::Counter,
            CtrKindSchema::FeatureFreq => Self::FeatureFreq,
        }
    }
}

impl From<CtrKind> for CtrKindSchema {
    fn from(kind: CtrKind) -> Self {
        match kind {
            CtrKind::Borders => Self::Borders,
            CtrKind::Buckets => Self::Buckets,
            CtrKind::BinarizedTargetMeanValue => Self::BinarizedTargetMeanValue,
            CtrKind::FloatTargetMeanValue => Self::FloatTargetMeanValue,
            CtrKind::Counter => Self::Counter,
            CtrKind::FeatureFreq => Self::FeatureFreq,
        }
    }
}

impl From<CtrSchema> for ModelCtr {
    fn from(ctr: CtrSchema) -> Self {
        Self {
            base_hash: ctr.base_hash,
            kind: ctr.kind.into(),
            target_border_idx: ctr.target_border_idx,
            prior_num: ctr.prior_num,
            prior_denom: ctr.prior_denom,
            shift: ctr.shift,
            scale: ctr.scale,
        }
    }
}

impl From<&ModelCtr> for CtrSchema {
    fn from(ctr: &ModelCtr) -> Self {
        Self {
            base_hash: ctr.base_hash,
            kind: ctr.kind.into(),
            target_border_idx: ctr.target_border_idx,
            prior_num: ctr.prior_num,
            prior_denom: ctr.prior_denom,
            shift: ctr.shift,
            scale: ctr.scale,
        }
    }
}

impl From<BinPredicateSchema> for BinFeaturePredicate {
    fn from(p: BinPredicateSchema) -> Self {
        Self {
            bin_index: p.bin_index,
            check_value_equal: p.check_value_equal,
            value: p.value,
        }
    }
}

impl From<&BinFeaturePredicate> for BinPredicateSchema {
    fn from(p: &BinFeaturePredicate) -> Self {
        Self {
            bin_index: p.bin_index,
            check_value_equal: p.check_value_equal,
            value: p.value,
        }
    }
}

impl From<CtrProjectionSchema> for CtrGroup {
    fn from(p: CtrProjectionSchema) -> Self {
        Self {
            projection: CtrProjection {
                cat_features: p.cat_features,
                bin_predicates: p.binarized.into_iter().map(Into::into).collect(),
            },
            ctrs: p.ctrs.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&CtrGroup> for CtrProjectionSchema {
    fn from(group: &CtrGroup) -> Self {
        Self {
            cat_features: group.projection.cat_features.clone(),
            binarized: group.projection.bin_predicates.iter().map(Into::into).collect(),
            ctrs: group.ctrs.iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<CtrTableSchema> for CtrValueTable {
    type Error = ModelValidationError;

    fn try_from(table: CtrTableSchema) -> Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(table.index.len());
        for (key, bucket) in table.index {
            if index.insert(key, bucket).is_some() {
                return Err(ModelValidationError::DuplicateCtrKey {
                    base_hash: table.base_hash,
                    key,
                });
            }
        }
        Ok(Self {
            index,
            target_classes_count: table.target_classes_count,
            counter_denominator: table.counter_denominator,
            mean_history: table
                .mean_history
                .into_iter()
                .map(|h| CtrMeanHistory {
                    sum: h.sum,
                    count: h.count,
                })
                .collect(),
            totals: table.totals,
        })
    }
}

fn table_to_schema(base_hash: u64, table: &CtrValueTable) -> CtrTableSchema {
    let mut index: Vec<(u64, u32)> = table.index.iter().map(|(&k, &v)| (k, v)).collect();
    // Deterministic output
    index.sort_unstable();
    CtrTableSchema {
        base_hash,
        index,
        target_classes_count: table.target_classes_count,
        counter_denominator: table.counter_denominator,
        mean_history: table
            .mean_history
            .iter()
            .map(|h| MeanHistorySchema {
                sum: h.sum,
                count: h.count,
            })
            .collect(),
        totals: table.totals.clone(),
    }
}

// =============================================================================
// Model
// =============================================================================

impl TryFrom<ModelSchema> for Model {
    type Error = ReadError;

    fn try_from(schema: ModelSchema) -> Result<Self, Self::Error> {
        if schema.format_version != FORMAT_VERSION {
            return Err(ReadError::UnsupportedVersion {
                found: schema.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let mut builder = Model::builder().scale(schema.scale).biases(schema.biases);
        for borders in schema.float_borders {
            builder = builder.float_feature(borders);
        }
        for cat in schema.cat_features {
            builder = builder.cat_feature(cat.hashes);
        }
        for one_hot in schema.one_hot_features {
            builder = builder.one_hot(one_hot.cat_feature, one_hot.hash_values);
        }
        for projection in schema.ctrs.projections {
            builder = builder.ctr_group(projection.into());
        }
        for table in schema.ctrs.tables {
            let base_hash = table.base_hash;
            builder = builder.ctr_table(base_hash, table.try_into()?);
        }
        for borders in schema.ctr_borders {
            builder = builder.ctr_borders(borders);
        }
        for tree in schema.trees {
            let splits = tree
                .splits
                .into_iter()
                .map(|s| ObliviousSplit {
                    feature: s.feature,
                    border: s.border,
                    xor_mask: s.xor_mask,
                })
                .collect();
            let leaves = tree.leaf_values.into_iter().map(|v| v as f32).collect();
            builder = builder.tree(splits, leaves);
        }
        if let Some(count) = schema.binary_feature_count {
            builder = builder.binary_feature_count(count);
        }

        Ok(builder.build()?)
    }
}

impl From<&Model> for ModelSchema {
    fn from(model: &Model) -> Self {
        let ctrs = model.ctrs();
        Self {
            format_version: FORMAT_VERSION,
            float_borders: model
                .float_borders()
                .iter()
                .map(|b| b.as_slice().to_vec())
                .collect(),
            cat_features: model
                .cat_features()
                .iter()
                .map(|c| CatFeatureSchema {
                    hashes: c.hashes().to_vec(),
                })
                .collect(),
            one_hot_features: model
                .one_hot_features()
                .iter()
                .map(|o| OneHotFeatureSchema {
                    cat_feature: o.cat_feature(),
                    hash_values: o.hash_values().to_vec(),
                })
                .collect(),
            ctrs: CtrsSchema {
                projections: ctrs.groups().iter().map(Into::into).collect(),
                tables: ctrs
                    .tables_with_hashes()
                    .map(|(base_hash, table)| table_to_schema(base_hash, table))
                    .collect(),
            },
            ctr_borders: model
                .ctr_borders()
                .iter()
                .map(|b| b.as_slice().to_vec())
                .collect(),
            trees: model
                .forest()
                .trees()
                .map(|tree| TreeSchema {
                    splits: (0..tree.depth())
                        .map(|level| {
                            let split = tree.split(level);
                            SplitSchema {
                                feature: split.feature,
                                border: split.border,
                                xor_mask: split.xor_mask,
                            }
                        })
                        .collect(),
                    leaf_values: tree.leaf_values.iter().map(|&v| v as f64).collect(),
                })
                .collect(),
            scale: model.scale(),
            biases: model.biases().to_vec(),
            binary_feature_count: Some(model.binary_feature_count()),
        }
    }
}
