//! Seeded random models and records.

use std::collections::HashMap;

use rand::prelude::*;

use crate::repr::{
    BinFeaturePredicate, CtrGroup, CtrKind, CtrMeanHistory, CtrProjection, CtrValueTable, Model,
    ModelCtr, ObliviousSplit, combine_hash,
};

const ALL_KINDS: [CtrKind; 6] = [
    CtrKind::Borders,
    CtrKind::Buckets,
    CtrKind::BinarizedTargetMeanValue,
    CtrKind::FloatTargetMeanValue,
    CtrKind::Counter,
    CtrKind::FeatureFreq,
];

/// Shape of a [`synthetic_model`].
#[derive(Debug, Clone, Copy)]
pub struct SyntheticParams {
    pub n_float: usize,
    pub n_cat: usize,
    pub n_one_hot: usize,
    /// CTR projections; ignored without categorical features.
    pub n_ctr_groups: usize,
    pub n_trees: usize,
    pub max_depth: usize,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            n_float: 6,
            n_cat: 3,
            n_one_hot: 2,
            n_ctr_groups: 2,
            n_trees: 32,
            max_depth: 6,
        }
    }
}

fn sorted_borders(rng: &mut StdRng, max_len: usize, lo: f32, hi: f32) -> Vec<f32> {
    let len = rng.gen_range(0..=max_len);
    let mut borders: Vec<f32> = (0..len).map(|_| rng.gen_range(lo..hi)).collect();
    borders.sort_by(f32::total_cmp);
    borders
}

/// All combination keys a projection can produce over the listed categories.
fn reachable_keys(
    cat_tables: &[&[i32]],
    n_predicates: usize,
) -> Vec<u64> {
    let mut keys = vec![0u64];
    for table in cat_tables {
        keys = keys
            .iter()
            .flat_map(|&key| table.iter().map(move |&h| combine_hash(key, h as i64 as u64)))
            .collect();
    }
    for _ in 0..n_predicates {
        keys = keys
            .iter()
            .flat_map(|&key| [combine_hash(key, 0), combine_hash(key, 1)])
            .collect();
    }
    keys
}

fn synthetic_table(rng: &mut StdRng, ctr: &mut ModelCtr, keys: &[u64]) -> CtrValueTable {
    let mut index = HashMap::new();
    for &key in keys {
        if rng.gen_bool(0.7) {
            let bucket = index.len() as u32;
            index.entry(key).or_insert(bucket);
        }
    }
    let n_buckets = index.len();
    let mut table = CtrValueTable {
        index,
        ..Default::default()
    };

    match ctr.kind {
        CtrKind::BinarizedTargetMeanValue | CtrKind::FloatTargetMeanValue => {
            table.mean_history = (0..n_buckets)
                .map(|_| {
                    let count = rng.gen_range(1..20);
                    CtrMeanHistory {
                        sum: rng.r#gen::<f32>() * count as f32,
                        count,
                    }
                })
                .collect();
        }
        CtrKind::Counter | CtrKind::FeatureFreq => {
            table.totals = (0..n_buckets).map(|_| rng.gen_range(0..50)).collect();
            table.counter_denominator = table.totals.iter().copied().max().unwrap_or(0) + 1;
        }
        CtrKind::Buckets => {
            let classes = rng.gen_range(1..=3u32);
            table.target_classes_count = classes;
            table.totals = (0..n_buckets * classes as usize)
                .map(|_| rng.gen_range(0..30))
                .collect();
            ctr.target_border_idx = rng.gen_range(0..classes);
        }
        CtrKind::Borders => {
            let classes = rng.gen_range(2..=4u32);
            table.target_classes_count = classes;
            table.totals = (0..n_buckets * classes as usize)
                .map(|_| rng.gen_range(0..30))
                .collect();
            ctr.target_border_idx = rng.gen_range(0..classes - 1);
        }
    }
    table
}

/// Build a random valid model.
///
/// Exercises every binarized-feature family: numeric slots (some without
/// borders), one-hot descriptors and CTRs of every kind (some without
/// borders). Split borders stay within each slot's reachable byte range so
/// both branches of most splits are taken.
///
/// # Panics
///
/// Panics if the generated model fails validation, which indicates a bug in
/// the generator.
pub fn synthetic_model(seed: u64, params: &SyntheticParams) -> Model {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = Model::builder()
        .scale(rng.gen_range(0.5..1.5))
        .bias(rng.gen_range(-1.0..1.0));

    // Largest byte each binarized slot can take, in bin order.
    let mut bin_ranges: Vec<u8> = Vec::new();

    for _ in 0..params.n_float {
        let borders = if rng.gen_bool(0.15) {
            Vec::new()
        } else {
            sorted_borders(&mut rng, 12, -1.0, 1.0)
        };
        if !borders.is_empty() {
            bin_ranges.push(borders.len() as u8);
        }
        builder = builder.float_feature(borders);
    }

    let cat_tables: Vec<Vec<i32>> = (0..params.n_cat)
        .map(|_| {
            let n_categories = rng.gen_range(1..=6);
            (0..n_categories).map(|_| rng.gen_range(-1_000_000..1_000_000)).collect()
        })
        .collect();
    for table in &cat_tables {
        builder = builder.cat_feature(table.clone());
    }

    if params.n_cat > 0 {
        for _ in 0..params.n_one_hot {
            let cat = rng.gen_range(0..params.n_cat);
            let n_values = rng.gen_range(1..=3);
            let hashes: Vec<i32> = (0..n_values)
                .map(|_| match cat_tables[cat].choose(&mut rng) {
                    Some(&h) if rng.gen_bool(0.8) => h,
                    _ => rng.r#gen(),
                })
                .collect();
            bin_ranges.push(hashes.len() as u8);
            builder = builder.one_hot(cat, hashes);
        }

        let prefix = bin_ranges.len();
        for _ in 0..params.n_ctr_groups {
            let n_cats = rng.gen_range(1..=params.n_cat.min(2));
            let cat_features: Vec<u32> = (0..n_cats)
                .map(|_| rng.gen_range(0..params.n_cat as u32))
                .collect();
            let bin_predicates: Vec<BinFeaturePredicate> = if prefix > 0 && rng.gen_bool(0.5) {
                let bin_index = rng.gen_range(0..prefix);
                vec![BinFeaturePredicate {
                    bin_index: bin_index as u32,
                    check_value_equal: rng.r#gen(),
                    value: rng.gen_range(0..=bin_ranges[bin_index]),
                }]
            } else {
                Vec::new()
            };

            let tables: Vec<&[i32]> = cat_features
                .iter()
                .map(|&c| cat_tables[c as usize].as_slice())
                .collect();
            let keys = reachable_keys(&tables, bin_predicates.len());

            let n_ctrs = rng.gen_range(1..=2);
            let mut ctrs = Vec::with_capacity(n_ctrs);
            for _ in 0..n_ctrs {
                let mut ctr = ModelCtr {
                    base_hash: rng.r#gen(),
                    kind: *ALL_KINDS.choose(&mut rng).unwrap_or(&CtrKind::Counter),
                    target_border_idx: 0,
                    prior_num: rng.r#gen(),
                    prior_denom: 1.0 + rng.r#gen::<f32>(),
                    shift: -rng.r#gen::<f32>() * 0.5,
                    scale: rng.gen_range(0.5..2.0),
                };
                let table = synthetic_table(&mut rng, &mut ctr, &keys);
                builder = builder.ctr_table(ctr.base_hash, table);
                ctrs.push(ctr);
            }

            for _ in &ctrs {
                let borders = if rng.gen_bool(0.15) {
                    Vec::new()
                } else {
                    sorted_borders(&mut rng, 6, -0.5, 1.5)
                };
                if !borders.is_empty() {
                    bin_ranges.push(borders.len() as u8);
                }
                builder = builder.ctr_borders(borders);
            }

            builder = builder.ctr_group(CtrGroup {
                projection: CtrProjection {
                    cat_features,
                    bin_predicates,
                },
                ctrs,
            });
        }
    }

    for _ in 0..params.n_trees {
        let depth = if bin_ranges.is_empty() {
            0
        } else {
            rng.gen_range(0..=params.max_depth)
        };
        let splits: Vec<ObliviousSplit> = (0..depth)
            .map(|_| {
                let feature = rng.gen_range(0..bin_ranges.len());
                let xor_mask = if rng.gen_bool(0.1) { rng.r#gen() } else { 0 };
                ObliviousSplit {
                    feature: feature as u32,
                    border: rng.gen_range(1..=bin_ranges[feature].max(1)),
                    xor_mask,
                }
            })
            .collect();
        let leaves: Vec<f32> = (0..1usize << depth)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        builder = builder.tree(splits, leaves);
    }

    builder.build().expect("synthetic model is valid")
}

/// Random records for `model`, flat and row-major.
///
/// Numeric values straddle the generated borders with occasional NaN.
/// Categorical values are mostly valid indexes, with fractional, negative,
/// NaN and out-of-range values mixed in.
pub fn random_records(model: &Model, n_records: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n_records * model.n_features());
    for _ in 0..n_records {
        for _ in 0..model.float_feature_count() {
            let value = if rng.gen_bool(0.05) {
                f32::NAN
            } else {
                rng.gen_range(-1.5..1.5)
            };
            records.push(value);
        }
        for cat in model.cat_features() {
            let n = cat.n_categories() as f32;
            let value = match rng.gen_range(0..20) {
                0 => f32::NAN,
                1 => -1.0,
                2 => n + rng.gen_range(0.0..3.0),
                3 => rng.gen_range(0.0..n),
                _ => rng.gen_range(0..cat.n_categories()) as f32,
            };
            records.push(value);
        }
    }
    records
}
