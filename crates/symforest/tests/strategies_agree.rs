//! Property-based agreement tests between scoring strategies.
//!
//! Random models (numeric, one-hot and CTR features) and random records are
//! scored by the naive reference and every optimized strategy. Also checks
//! the binarization properties: monotonicity, idempotence over dirty
//! buffers, fail-closed categoricals, and tree-order independence.

use approx::assert_abs_diff_eq;
use ndarray::ArrayView2;
use proptest::prelude::*;

use symforest::inference::{ScalarScorer, UnrolledScorer};
use symforest::repr::Model;
use symforest::testing::{ReferenceScorer, SyntheticParams, random_records, synthetic_model};
use symforest::{AnyScorer, Parallelism, ScorerConfig, Scratch};

#[cfg(feature = "simd")]
use symforest::inference::SimdScorer;

// =============================================================================
// Generators
// =============================================================================

fn arb_params() -> impl Strategy<Value = SyntheticParams> {
    (1usize..8, 0usize..4, 0usize..4, 0usize..4, 1usize..40, 0usize..=10).prop_map(
        |(n_float, n_cat, n_one_hot, n_ctr_groups, n_trees, max_depth)| SyntheticParams {
            n_float,
            n_cat,
            n_one_hot,
            n_ctr_groups,
            n_trees,
            max_depth,
        },
    )
}

fn arb_model() -> impl Strategy<Value = Model> {
    (any::<u64>(), arb_params()).prop_map(|(seed, params)| synthetic_model(seed, &params))
}

/// Bin slot of every numeric input that has borders.
fn float_bin_slots(model: &Model) -> Vec<(usize, usize)> {
    model
        .float_borders()
        .iter()
        .enumerate()
        .filter(|(_, borders)| !borders.is_empty())
        .enumerate()
        .map(|(bin, (input, _))| (input, bin))
        .collect()
}

// =============================================================================
// Agreement
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn strategies_agree_with_reference(model in arb_model(), seed in any::<u64>()) {
        let n_records = 37;
        let records = random_records(&model, n_records, seed);
        let expected = ReferenceScorer::new(&model).score_all(&records);
        prop_assert_eq!(expected.len(), n_records);

        let scalar = ScalarScorer::new(&model);
        let unrolled = UnrolledScorer::new(&model).with_block_size(8);
        let mut scratch = Scratch::new();
        let mut out = vec![0.0f64; n_records];

        scalar.score_batch(&records, &mut out, &mut scratch);
        for (a, e) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-9);
        }

        unrolled.score_batch(&records, &mut out, &mut scratch);
        for (a, e) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-9);
        }

        #[cfg(feature = "simd")]
        {
            let simd = SimdScorer::new(&model).with_block_size(16);
            simd.score_batch(&records, &mut out, &mut scratch);
            for (a, e) in out.iter().zip(&expected) {
                assert_abs_diff_eq!(*a, *e, epsilon = 1e-9);
            }
        }

        unrolled.par_score_batch(&records, &mut out, Parallelism::Parallel);
        for (a, e) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-9);
        }

        if model.n_features() > 0 {
            let view = ArrayView2::from_shape((n_records, model.n_features()), &records).unwrap();
            let scores = unrolled.score_array(view, Parallelism::Sequential);
            for (a, e) in scores.iter().zip(&expected) {
                assert_abs_diff_eq!(*a, *e, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn runtime_dispatch_matches_reference(model in arb_model(), seed in any::<u64>()) {
        let records = random_records(&model, 5, seed);
        let reference = ReferenceScorer::new(&model);
        let width = model.n_features();

        for strategy in [
            symforest::Strategy::Scalar,
            symforest::Strategy::Unrolled,
            symforest::Strategy::Simd,
        ] {
            let config = ScorerConfig::builder().strategy(strategy).build().unwrap();
            let scorer = AnyScorer::new(&model, &config);
            let mut scratch = scorer.new_scratch();
            for record in records.chunks_exact(width.max(1)).take(5) {
                let record = &record[..width];
                assert_abs_diff_eq!(
                    scorer.score(record, &mut scratch),
                    reference.score(record),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn hashed_entry_point_matches_raw(model in arb_model(), seed in any::<u64>()) {
        let records = random_records(&model, 3, seed);
        let scorer = UnrolledScorer::new(&model);
        let reference = ReferenceScorer::new(&model);
        let mut scratch = scorer.new_scratch();
        let n_floats = model.float_feature_count();

        for record in records.chunks_exact(model.n_features().max(1)) {
            let (floats, cats) = record.split_at(n_floats);
            let hashes: Vec<i32> = model
                .cat_features()
                .iter()
                .zip(cats)
                .map(|(feature, &raw)| feature.hash_of(raw))
                .collect();
            let hashed = scorer.score_hashed(floats, &hashes, &mut scratch).unwrap();
            assert_abs_diff_eq!(hashed, reference.score(record), epsilon = 1e-9);
            assert_abs_diff_eq!(hashed, reference.score_hashed(floats, &hashes), epsilon = 1e-9);
        }
    }
}

// =============================================================================
// Binarization properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn numeric_binarization_is_monotone(
        model in arb_model(),
        seed in any::<u64>(),
        a in -2.0f32..2.0,
        b in -2.0f32..2.0,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut record = random_records(&model, 1, seed);
        let scorer = UnrolledScorer::new(&model);
        let mut scratch = scorer.new_scratch();

        for (input, bin) in float_bin_slots(&model) {
            record[input] = lo;
            scorer.binarizer().binarize_record(&record, &mut scratch).unwrap();
            let low = scratch.bins()[bin];
            record[input] = hi;
            scorer.binarizer().binarize_record(&record, &mut scratch).unwrap();
            let high = scratch.bins()[bin];
            prop_assert!(low <= high, "input {} bin {}: {} > {}", input, bin, low, high);
        }
    }

    #[test]
    fn binarization_ignores_prior_buffer_contents(
        model in arb_model(),
        other in arb_model(),
        seed in any::<u64>(),
    ) {
        let record = random_records(&model, 1, seed);
        let scorer = UnrolledScorer::new(&model);

        let mut fresh = Scratch::new();
        let score_fresh = scorer.score(&record, &mut fresh);

        // Dirty the buffers with another model and other records first.
        let mut dirty = Scratch::new();
        let other_scorer = UnrolledScorer::new(&other);
        let other_records = random_records(&other, 1, seed ^ 0x5555);
        other_scorer.score(&other_records, &mut dirty);
        let noise = random_records(&model, 1, seed.wrapping_add(1));
        scorer.score(&noise, &mut dirty);

        let score_dirty = scorer.score(&record, &mut dirty);
        prop_assert_eq!(fresh.bins(), dirty.bins());
        prop_assert_eq!(fresh.ctr_values().len(), dirty.ctr_values().len());
        for (a, b) in fresh.ctr_values().iter().zip(dirty.ctr_values()) {
            prop_assert!(a.to_bits() == b.to_bits());
        }
        prop_assert_eq!(score_fresh.to_bits(), score_dirty.to_bits());
    }

    #[test]
    fn out_of_range_categoricals_one_hot_to_zero(
        model in arb_model(),
        seed in any::<u64>(),
        offset in 0u32..100,
        negative in any::<bool>(),
    ) {
        let mut record = random_records(&model, 1, seed);
        let n_floats = model.float_feature_count();
        for (slot, feature) in model.cat_features().iter().enumerate() {
            record[n_floats + slot] = if negative {
                -1.0 - offset as f32
            } else {
                (feature.n_categories() as u32 + offset) as f32
            };
        }

        let scorer = ScalarScorer::new(&model);
        let mut scratch = scorer.new_scratch();
        scorer.binarizer().binarize_record(&record, &mut scratch).unwrap();
        let one_hot_bins = &scratch.bins()[model.one_hot_offset()..model.ctr_offset()];
        prop_assert!(one_hot_bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn tree_order_does_not_change_scores(
        (model, order) in arb_model().prop_flat_map(|model| {
            let order: Vec<usize> = (0..model.forest().n_trees()).collect();
            (Just(model), Just(order).prop_shuffle())
        }),
        seed in any::<u64>(),
    ) {
        let permuted = model
            .clone()
            .with_forest(model.forest().reordered(&order))
            .unwrap();
        let records = random_records(&model, 16, seed);

        let scorer = UnrolledScorer::new(&model);
        let permuted_scorer = UnrolledScorer::new(&permuted);
        let mut scratch = Scratch::new();
        let mut out = vec![0.0; 16];
        let mut out_permuted = vec![0.0; 16];
        scorer.score_batch(&records, &mut out, &mut scratch);
        permuted_scorer.score_batch(&records, &mut out_permuted, &mut scratch);

        for (a, b) in out.iter().zip(&out_permuted) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
