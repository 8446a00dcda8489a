//! Testing utilities.
//!
//! - [`ReferenceScorer`]: naive scorer used as an oracle
//! - [`synthetic_model`] / [`random_records`]: seeded random inputs
//! - [`AgreementStats`]: error summary between two score vectors

mod agreement;
mod reference;
mod synthetic;

pub use agreement::{AgreementStats, EXACT_MATCH_EPSILON};
pub use reference::ReferenceScorer;
pub use synthetic::{SyntheticParams, random_records, synthetic_model};
