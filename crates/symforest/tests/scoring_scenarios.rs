//! End-to-end scoring scenarios on hand-built and fixture models.
//!
//! Test cases:
//! - Depth-1 model over 6 numeric + 3 categorical inputs
//! - Shape mismatch sentinel
//! - Golden scores for a fixture with numeric, one-hot and CTR features
//! - One million records through the single-record and batch entry points

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;

use symforest::inference::{SHAPE_MISMATCH_SCORE, ScalarScorer, UnrolledScorer};
use symforest::repr::{Model, ObliviousSplit};
use symforest::testing::{ReferenceScorer, SyntheticParams, random_records, synthetic_model};
use symforest::{AnyScorer, Parallelism, ScoreError, ScorerConfig, Strategy, persist};

// =============================================================================
// Helpers
// =============================================================================

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

fn load_fixture(name: &str) -> Model {
    let path = test_cases_dir().join("models").join(name);
    let file = File::open(&path).unwrap_or_else(|e| panic!("open {}: {e}", path.display()));
    persist::read_json(BufReader::new(file)).expect("fixture model loads")
}

/// 6 numeric + 3 categorical inputs, one depth-1 tree on numeric slot 0.
fn depth_one_model() -> Model {
    let mut builder = Model::builder();
    for _ in 0..6 {
        builder = builder.float_feature(vec![0.5]);
    }
    for _ in 0..3 {
        builder = builder.cat_feature(vec![1, 2, 3]);
    }
    builder
        .tree(
            vec![ObliviousSplit {
                feature: 0,
                border: 1,
                xor_mask: 0,
            }],
            vec![10.0, 20.0],
        )
        .scale(1.0)
        .bias(0.0)
        .build()
        .unwrap()
}

fn all_strategies() -> Vec<Strategy> {
    vec![Strategy::Scalar, Strategy::Unrolled, Strategy::Simd]
}

// =============================================================================
// Depth-1 scenario
// =============================================================================

#[test]
fn depth_one_tree_selects_leaf_by_slot_zero() {
    let model = depth_one_model();
    assert_eq!(model.n_features(), 9);

    for strategy in all_strategies() {
        let config = ScorerConfig::builder().strategy(strategy).build().unwrap();
        let scorer = AnyScorer::new(&model, &config);
        let mut scratch = scorer.new_scratch();

        let low = [0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 2.0];
        let high = [0.7, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0];
        assert_eq!(scorer.score(&low, &mut scratch), 10.0, "{strategy}");
        assert_eq!(scorer.score(&high, &mut scratch), 20.0, "{strategy}");
    }
}

#[test]
fn eight_inputs_instead_of_nine_score_sentinel() {
    let model = depth_one_model();
    let scorer = UnrolledScorer::new(&model);
    let mut scratch = scorer.new_scratch();

    let short = [0.7f32; 8];
    assert_eq!(scorer.score(&short, &mut scratch), SHAPE_MISMATCH_SCORE);
    assert_eq!(SHAPE_MISMATCH_SCORE, -1.0);
    assert!(matches!(
        scorer.try_score(&short, &mut scratch),
        Err(ScoreError::ShapeMismatch {
            expected: 9,
            got: 8
        })
    ));

    // A scorer stays usable after a rejected record.
    let good = [0.7, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    assert_eq!(scorer.score(&good, &mut scratch), 20.0);
}

#[test]
fn short_batch_buffer_scores_sentinel_for_incomplete_records() {
    let model = depth_one_model();
    let scorer = UnrolledScorer::new(&model);
    let mut scratch = scorer.new_scratch();

    // Two full records and a partial third.
    let mut records = vec![0.0f32; 9 * 2 + 4];
    records[9] = 1.0;
    let mut out = [0.0f64; 3];
    scorer.score_batch(&records, &mut out, &mut scratch);
    assert_eq!(out, [10.0, 20.0, SHAPE_MISMATCH_SCORE]);
}

// =============================================================================
// Fixture golden scores
// =============================================================================

/// `(record, expected score, expected binarized vector)`.
fn mixed_cases() -> Vec<([f32; 5], f64, [u8; 4])> {
    vec![
        ([1.0, 0.0, 0.0, 0.0, 0.0], 4.875000001862645, [1, 1, 0, 1]),
        ([0.2, 9.0, -2.0, 1.0, 1.0], -1.0749999936670065, [0, 0, 1, 2]),
        ([2.0, 0.0, 5.0, 2.0, 0.0], 8.475000003352761, [2, 1, 2, 2]),
        ([f32::NAN, 0.0, 0.0, 7.0, 0.0], 5.825000001117587, [0, 1, 0, 2]),
        ([1.0, 0.0, 0.0, 0.9, -1.0], 4.875000001862645, [1, 1, 0, 1]),
        ([0.0, 0.0, 0.0, 1.0, f32::NAN], 5.9250000063329935, [0, 1, 1, 2]),
    ]
}

#[test]
fn mixed_fixture_layout() {
    let model = load_fixture("mixed.json");
    assert_eq!(model.float_feature_count(), 3);
    assert_eq!(model.cat_feature_count(), 2);
    assert_eq!(model.n_ctrs(), 2);
    // Two numeric slots with borders, one one-hot, one CTR with borders.
    assert_eq!(model.binary_feature_count(), 4);
    assert_eq!(model.forest().n_trees(), 5);
}

#[test]
fn mixed_fixture_golden_scores() {
    let model = load_fixture("mixed.json");
    let reference = ReferenceScorer::new(&model);

    for strategy in all_strategies() {
        let config = ScorerConfig::builder().strategy(strategy).build().unwrap();
        let scorer = AnyScorer::new(&model, &config);
        let mut scratch = scorer.new_scratch();

        for (record, expected, bins) in mixed_cases() {
            assert_eq!(reference.binarize(&record).as_deref(), Some(&bins[..]));
            assert_abs_diff_eq!(reference.score(&record), expected, epsilon = 1e-9);
            assert_abs_diff_eq!(scorer.score(&record, &mut scratch), expected, epsilon = 1e-9);
            assert_eq!(scratch.bins(), &bins[..], "{strategy}");
        }
    }
}

#[test]
fn mixed_fixture_ctr_values() {
    let model = load_fixture("mixed.json");
    let scorer = ScalarScorer::new(&model);
    let mut scratch = scorer.new_scratch();

    // Known key in both tables: counter bucket 2, mean bucket 0.
    scorer.score(&[2.0, 0.0, 5.0, 2.0, 0.0], &mut scratch);
    assert_abs_diff_eq!(scratch.ctr_values()[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(scratch.ctr_values()[1], 0.2, epsilon = 1e-6);

    // Out-of-range category: both CTRs fall back to their default estimate.
    scorer.score(&[f32::NAN, 0.0, 0.0, 7.0, 0.0], &mut scratch);
    assert_abs_diff_eq!(scratch.ctr_values()[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(scratch.ctr_values()[1], -1.0, epsilon = 1e-6);
}

#[test]
fn mixed_fixture_batch_matches_single() {
    let model = load_fixture("mixed.json");
    let scorer = UnrolledScorer::new(&model).with_block_size(4);
    let mut scratch = scorer.new_scratch();

    let cases = mixed_cases();
    let records: Vec<f32> = cases.iter().flat_map(|(r, _, _)| r.iter().copied()).collect();
    let mut out = vec![0.0f64; cases.len()];
    scorer.score_batch(&records, &mut out, &mut scratch);
    for (score, (_, expected, _)) in out.iter().zip(&cases) {
        assert_abs_diff_eq!(*score, *expected, epsilon = 1e-9);
    }
}

// =============================================================================
// One million records
// =============================================================================

#[test]
fn million_records_single_and_batch_identical() {
    let params = SyntheticParams {
        n_trees: 16,
        ..Default::default()
    };
    let model = synthetic_model(2024, &params);
    let n_records = 1_000_000;
    let records = random_records(&model, n_records, 99);
    let n_features = model.n_features();

    let scorer = UnrolledScorer::new(&model);
    let mut scratch = scorer.new_scratch();

    let single: Vec<f64> = records
        .chunks_exact(n_features)
        .map(|record| scorer.score(record, &mut scratch))
        .collect();

    let mut batch = vec![0.0f64; n_records];
    scorer.score_batch(&records, &mut batch, &mut scratch);
    assert_eq!(single, batch);

    let mut parallel = vec![0.0f64; n_records];
    scorer.par_score_batch(&records, &mut parallel, Parallelism::Parallel);
    assert_eq!(single, parallel);
}
