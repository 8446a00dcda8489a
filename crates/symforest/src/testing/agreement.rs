//! Agreement between two score vectors.

use std::fmt;

/// Absolute error below which two scores count as an exact match.
pub const EXACT_MATCH_EPSILON: f64 = 1e-6;

/// Summary of `|actual - expected|` over paired scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreementStats {
    pub n: usize,
    pub max_abs_error: f64,
    pub mean_abs_error: f64,
    pub rmse: f64,
    /// Share of pairs closer than [`EXACT_MATCH_EPSILON`].
    pub exact_match_ratio: f64,
}

impl AgreementStats {
    /// Compare paired scores.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn compute(actual: &[f64], expected: &[f64]) -> Self {
        assert_eq!(actual.len(), expected.len(), "score vectors differ in length");
        let n = actual.len();
        if n == 0 {
            return Self {
                n,
                max_abs_error: 0.0,
                mean_abs_error: 0.0,
                rmse: 0.0,
                exact_match_ratio: 1.0,
            };
        }

        let mut max_abs_error = 0.0f64;
        let mut sum_abs = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut exact = 0usize;
        for (&a, &e) in actual.iter().zip(expected) {
            let error = (a - e).abs();
            // `f64::max` drops NaN; keep it so the comparison fails.
            if error.is_nan() || max_abs_error.is_nan() {
                max_abs_error = f64::NAN;
            } else {
                max_abs_error = max_abs_error.max(error);
            }
            sum_abs += error;
            sum_sq += error * error;
            exact += (error < EXACT_MATCH_EPSILON) as usize;
        }

        Self {
            n,
            max_abs_error,
            mean_abs_error: sum_abs / n as f64,
            rmse: (sum_sq / n as f64).sqrt(),
            exact_match_ratio: exact as f64 / n as f64,
        }
    }

    /// Whether every pair is within `tolerance`.
    pub fn within(&self, tolerance: f64) -> bool {
        self.max_abs_error <= tolerance
    }
}

impl fmt::Display for AgreementStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} exact={:.4} max_abs={:.3e} mean_abs={:.3e} rmse={:.3e}",
            self.n, self.exact_match_ratio, self.max_abs_error, self.mean_abs_error, self.rmse
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn identical_scores() {
        let stats = AgreementStats::compute(&[1.0, 2.0], &[1.0, 2.0]);
        assert_eq!(stats.exact_match_ratio, 1.0);
        assert_eq!(stats.max_abs_error, 0.0);
        assert!(stats.within(0.0));
    }

    #[test]
    fn summarizes_errors() {
        let stats = AgreementStats::compute(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.5, 3.0, 3.0]);
        assert_eq!(stats.n, 4);
        assert_abs_diff_eq!(stats.max_abs_error, 1.0);
        assert_abs_diff_eq!(stats.mean_abs_error, 0.375);
        assert_abs_diff_eq!(stats.rmse, (1.25f64 / 4.0).sqrt());
        assert_abs_diff_eq!(stats.exact_match_ratio, 0.5);
        assert!(stats.within(1.0));
        assert!(!stats.within(0.5));
    }

    #[test]
    fn nan_never_agrees() {
        let stats = AgreementStats::compute(&[f64::NAN, 1.0], &[0.0, 3.0]);
        assert!(!stats.within(1e9));
    }

    #[test]
    fn empty_input() {
        let stats = AgreementStats::compute(&[], &[]);
        assert_eq!(stats.n, 0);
        assert!(stats.within(0.0));
    }
}
