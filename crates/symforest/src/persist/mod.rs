//! JSON model persistence.
//!
//! Models are stored as a versioned JSON document ([`ModelSchema`]). Loading
//! converts the document through [`ModelBuilder`](crate::repr::ModelBuilder),
//! so a model that loads satisfies every structural invariant.
//!
//! # Example
//!
//! ```
//! use symforest::persist;
//!
//! let json = r#"{
//!     "format_version": 1,
//!     "float_borders": [[0.5]],
//!     "trees": [{ "splits": [{ "feature": 0, "border": 1 }], "leaf_values": [10.0, 20.0] }]
//! }"#;
//! let model = persist::from_json_str(json).unwrap();
//! assert_eq!(model.forest().n_trees(), 1);
//! ```

mod convert;
mod error;
pub mod schema;

use std::io::{Read, Write};

pub use error::{ReadError, WriteError};
pub use schema::{FORMAT_VERSION, ModelSchema};

use crate::repr::Model;

/// Read a model from a JSON document.
///
/// Wrap files in a [`BufReader`](std::io::BufReader); this reads in small pieces.
pub fn read_json<R: Read>(reader: R) -> Result<Model, ReadError> {
    let schema: ModelSchema = serde_json::from_reader(reader).map_err(|err| {
        if err.is_io() {
            ReadError::Io(err.into())
        } else {
            ReadError::Json(err)
        }
    })?;
    from_schema(schema)
}

/// Read a model from a JSON string.
pub fn from_json_str(json: &str) -> Result<Model, ReadError> {
    let schema: ModelSchema = serde_json::from_str(json)?;
    from_schema(schema)
}

fn from_schema(schema: ModelSchema) -> Result<Model, ReadError> {
    let model = Model::try_from(schema)?;
    let forest = model.forest();
    tracing::info!(
        trees = forest.n_trees(),
        max_depth = forest.max_depth(),
        depth_histogram = ?forest.depth_histogram(),
        float_features = model.float_feature_count(),
        cat_features = model.cat_feature_count(),
        binary_features = model.binary_feature_count(),
        ctrs = model.n_ctrs(),
        "model loaded"
    );
    Ok(model)
}

/// Write `model` as pretty-printed JSON.
pub fn write_json<W: Write>(model: &Model, mut writer: W) -> Result<(), WriteError> {
    let schema = ModelSchema::from(model);
    serde_json::to_writer_pretty(&mut writer, &schema)?;
    writer.flush()?;
    Ok(())
}

/// Serialize `model` to a JSON string.
pub fn to_json_string(model: &Model) -> Result<String, WriteError> {
    Ok(serde_json::to_string_pretty(&ModelSchema::from(model))?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::repr::{
        BinFeaturePredicate, CtrGroup, CtrKind, CtrMeanHistory, CtrProjection, CtrValueTable,
        ModelCtr, ModelValidationError, ObliviousSplit,
    };

    fn ctr_model() -> Model {
        Model::builder()
            .float_feature(vec![0.5, 1.5])
            .float_feature(vec![])
            .cat_feature(vec![-7, 12, 99])
            .one_hot(0, vec![12])
            .ctr_group(CtrGroup {
                projection: CtrProjection {
                    cat_features: vec![0],
                    bin_predicates: vec![BinFeaturePredicate {
                        bin_index: 0,
                        check_value_equal: true,
                        value: 2,
                    }],
                },
                ctrs: vec![ModelCtr {
                    base_hash: u64::MAX - 3,
                    kind: CtrKind::BinarizedTargetMeanValue,
                    target_border_idx: 0,
                    prior_num: 0.5,
                    prior_denom: 1.0,
                    shift: -0.25,
                    scale: 2.0,
                }],
            })
            .ctr_table(
                u64::MAX - 3,
                CtrValueTable {
                    index: HashMap::from([(5, 1), (1, 0)]),
                    mean_history: vec![
                        CtrMeanHistory { sum: 1.0, count: 2 },
                        CtrMeanHistory { sum: 0.0, count: 9 },
                    ],
                    ..Default::default()
                },
            )
            .ctr_borders(vec![0.1, 0.2])
            .tree(
                vec![
                    ObliviousSplit {
                        feature: 0,
                        border: 1,
                        xor_mask: 0,
                    },
                    ObliviousSplit {
                        feature: 2,
                        border: 1,
                        xor_mask: 0,
                    },
                ],
                vec![0.25, -1.5, 3.0, 0.0],
            )
            .scale(0.5)
            .bias(-2.0)
            .build()
            .unwrap()
    }

    #[test]
    fn write_then_read_preserves_model() {
        let model = ctr_model();
        let mut bytes = Vec::new();
        write_json(&model, &mut bytes).unwrap();
        let loaded = read_json(bytes.as_slice()).unwrap();

        assert_eq!(ModelSchema::from(&loaded), ModelSchema::from(&model));
        assert_eq!(loaded.binary_feature_count(), 3);
        assert_eq!(loaded.forest(), model.forest());
    }

    #[test]
    fn output_is_deterministic() {
        let model = ctr_model();
        assert_eq!(to_json_string(&model).unwrap(), to_json_string(&model).unwrap());
    }

    #[test]
    fn rejects_unknown_version() {
        let json = r#"{ "format_version": 2, "float_borders": [], "trees": [] }"#;
        let err = from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            ReadError::UnsupportedVersion {
                found: 2,
                expected: 1
            }
        ));
    }

    #[test]
    fn rejects_leaf_count_mismatch() {
        let json = r#"{
            "format_version": 1,
            "float_borders": [[1.0]],
            "trees": [{ "splits": [{ "feature": 0, "border": 1 }], "leaf_values": [1.0] }]
        }"#;
        let err = from_json_str(json).unwrap_err();
        assert!(matches!(err, ReadError::Validation(ModelValidationError::Forest(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(from_json_str("{"), Err(ReadError::Json(_))));
    }

    struct FailingReader;

    impl std::io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk gone"))
        }
    }

    #[test]
    fn reader_failure_is_io_error() {
        let err = read_json(FailingReader).unwrap_err();
        assert!(matches!(err, ReadError::Io(_)), "got: {err:?}");
    }
}
