// ============================================================
// Layer 5 — Evaluation Metrics
// ============================================================
// Regression metrics for model selection and the acceptance
// gate. Both are computed on train AND test so a report makes
// overfitting visible at a glance.
//
// Reference: Rust Book §13 (Iterators and Closures)

use std::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Root mean squared error, in the target's own unit (dollars
/// of weekly sales here). Lengths must match.
pub fn rmse(predicted: ArrayView1<f64>, actual: ArrayView1<f64>) -> f64 {
    debug_assert_eq!(predicted.len(), actual.len());
    if actual.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    (sum_sq / actual.len() as f64).sqrt()
}

/// Coefficient of determination. 1.0 is a perfect fit, 0.0 is
/// no better than predicting the mean, negative is worse than
/// that. A constant target scores 1.0 only when matched exactly.
pub fn r2(predicted: ArrayView1<f64>, actual: ArrayView1<f64>) -> f64 {
    debug_assert_eq!(predicted.len(), actual.len());
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.sum() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    let ss_res: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Final scores of a trained model on both splits. Stored in the
/// artifact manifest so every persisted version carries the
/// evidence it was accepted on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub rmse_train: f64,
    pub rmse_test:  f64,
    pub r2_train:   f64,
    pub r2_test:    f64,
}

impl ScoreReport {
    /// The acceptance gate: held-out fit quality only. Training
    /// scores are reported but never gate anything.
    pub fn passes_gate(&self, min_r2_test: f64) -> bool {
        self.r2_test >= min_r2_test
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "train RMSE {:.2} R2 {:.4} | test RMSE {:.2} R2 {:.4}",
            self.rmse_train, self.r2_train, self.rmse_test, self.r2_test
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction_scores() {
        let actual = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(rmse(actual.view(), actual.view()), 0.0);
        assert_eq!(r2(actual.view(), actual.view()), 1.0);
    }

    #[test]
    fn test_rmse_known_value() {
        let predicted = array![2.0, 4.0];
        let actual    = array![1.0, 2.0];
        // errors 1 and 2, mean square 2.5
        assert!((rmse(predicted.view(), actual.view()) - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_of_mean_prediction_is_zero() {
        let actual = array![1.0, 2.0, 3.0];
        let predicted = array![2.0, 2.0, 2.0];
        assert!(r2(predicted.view(), actual.view()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_can_go_negative() {
        let actual = array![1.0, 2.0, 3.0];
        let predicted = array![3.0, 3.0, 3.0];
        assert!(r2(predicted.view(), actual.view()) < 0.0);
    }

    #[test]
    fn test_constant_target_needs_exact_match() {
        let actual = array![5.0, 5.0, 5.0];
        let exact  = array![5.0, 5.0, 5.0];
        let off    = array![5.0, 5.1, 5.0];
        assert_eq!(r2(exact.view(), actual.view()), 1.0);
        assert_eq!(r2(off.view(), actual.view()), 0.0);
    }

    #[test]
    fn test_gate_checks_test_r2_only() {
        let report = ScoreReport {
            rmse_train: 10.0,
            rmse_test:  500.0,
            r2_train:   0.99,
            r2_test:    0.59,
        };
        assert!(!report.passes_gate(0.6));
        assert!(report.passes_gate(0.5));
    }
}
