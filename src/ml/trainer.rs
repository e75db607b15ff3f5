// ============================================================
// Layer 5 — Grid Search Trainer
// ============================================================
// Exhaustive hyperparameter search with k-fold cross-validation,
// then a single refit of the winner and the acceptance gate.
//
// Key properties:
//   - The grid is validated BEFORE any fitting starts; a typo in
//     a parameter name fails in seconds, not after a long search
//   - Grid cells run sequentially with a cancellation check
//     between cells; the folds inside one cell run in parallel
//   - Model selection uses mean cross-validated R² on the
//     training split only; the test split is touched exactly
//     once, by the final refit's score report
//   - A winner that still scores under the gate on held-out data
//     is a Rejected outcome, not an error, and is never persisted
//
// Reference: Rust Book §16 (Concurrency), rayon documentation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::{s, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainingError;
use crate::domain::traits::Estimator;
use crate::ml::metrics::{self, ScoreReport};
use crate::ml::model::{GbdtParams, GbdtRegressor};

// ─── CancelToken ──────────────────────────────────────────────────────────────
/// Cooperative abort handle, shared with whatever owns the search
/// (a Ctrl-C handler, a supervising thread). Polled between grid
/// cells; a running cell always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── ParamGrid ────────────────────────────────────────────────────────────────
/// Candidate values per hyperparameter name. The JSON form is a
/// plain map, e.g. {"n_estimators": [50, 100], "max_depth": [3]}.
/// BTreeMap keeps expansion order independent of file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    entries: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    pub fn new(entries: BTreeMap<String, Vec<f64>>) -> Self {
        Self { entries }
    }

    /// The search used when no grid file is supplied.
    pub fn default_search() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("n_estimators".to_string(), vec![50.0, 100.0, 200.0]);
        entries.insert("learning_rate".to_string(), vec![0.05, 0.1, 0.2]);
        entries.insert("max_depth".to_string(), vec![2.0, 3.0, 4.0]);
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every name must be one the estimator accepts, with at least
    /// one candidate. Runs before any cell is fitted.
    pub fn validate(&self, accepted: &'static [&'static str]) -> Result<(), TrainingError> {
        for (name, values) in &self.entries {
            if !accepted.contains(&name.as_str()) {
                return Err(TrainingError::UnknownParameter {
                    name: name.clone(),
                    accepted,
                });
            }
            if values.is_empty() {
                return Err(TrainingError::EmptyCandidates { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Cartesian product of every candidate list over `base`.
    /// An empty grid yields the base parameters as the single cell.
    pub fn expand(&self, base: GbdtParams) -> Result<Vec<GbdtParams>, TrainingError> {
        let mut cells = vec![base];
        for (name, values) in &self.entries {
            let mut next = Vec::with_capacity(cells.len() * values.len());
            for cell in &cells {
                for &value in values {
                    next.push(cell.with_param(name, value)?);
                }
            }
            cells = next;
        }
        Ok(cells)
    }
}

// ─── TrainOutcome ─────────────────────────────────────────────────────────────
/// What a completed search produced. Rejection is a first-class
/// outcome: the search worked, the model just is not good enough
/// to serve.
#[derive(Debug)]
pub enum TrainOutcome {
    Accepted {
        model:  GbdtRegressor,
        params: GbdtParams,
        scores: ScoreReport,
    },
    Rejected {
        best_params: GbdtParams,
        scores:      ScoreReport,
    },
}

impl TrainOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn scores(&self) -> &ScoreReport {
        match self {
            Self::Accepted { scores, .. } | Self::Rejected { scores, .. } => scores,
        }
    }
}

// ─── GridSearchTrainer ────────────────────────────────────────────────────────
pub struct GridSearchTrainer {
    pub folds:       usize,
    pub min_r2_test: f64,
    cancel:          CancelToken,
}

impl GridSearchTrainer {
    pub fn new(folds: usize, min_r2_test: f64) -> Self {
        Self {
            folds,
            min_r2_test,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the full search and return the best model's fate.
    /// The feature matrices must already be transformed; this
    /// function never sees raw records.
    pub fn search(
        &self,
        grid:    &ParamGrid,
        x_train: ArrayView2<f64>,
        y_train: ArrayView1<f64>,
        x_test:  ArrayView2<f64>,
        y_test:  ArrayView1<f64>,
    ) -> Result<TrainOutcome> {
        ensure!(self.folds >= 2, "cross-validation needs at least 2 folds");
        let rows = x_train.nrows();
        if rows < self.folds {
            return Err(TrainingError::InsufficientData {
                rows,
                folds: self.folds,
            }
            .into());
        }

        // ── Validate and expand the grid ──────────────────────────────────────
        let base = GbdtParams::default();
        grid.validate(GbdtRegressor::new(base).accepted_params())?;
        let cells = grid.expand(base)?;
        tracing::info!(
            "Grid search: {} cells x {} folds on {} training rows",
            cells.len(),
            self.folds,
            rows
        );

        // ── Cross-validate every cell ─────────────────────────────────────────
        // Rows were shuffled upstream, so contiguous fold ranges
        // are as good as random ones and cost nothing to build.
        let fold_ranges = kfold_ranges(rows, self.folds);
        let mut best: Option<(f64, GbdtParams)> = None;

        for (idx, params) in cells.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(TrainingError::Cancelled {
                    completed: idx,
                    total:     cells.len(),
                }
                .into());
            }

            let fold_scores: Vec<f64> = fold_ranges
                .par_iter()
                .map(|&(lo, hi)| fold_score(x_train, y_train, lo, hi, *params))
                .collect::<Result<Vec<f64>>>()?;
            let mean_r2 = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;

            println!(
                "Cell {:>2}/{} | {} | cv_r2={:.4}",
                idx + 1,
                cells.len(),
                params,
                mean_r2
            );

            // strictly greater: ties keep the earliest cell
            if best.map_or(true, |(b, _)| mean_r2 > b) {
                best = Some((mean_r2, *params));
            }
        }

        let Some((best_cv, best_params)) = best else {
            anyhow::bail!("grid produced no cells");
        };
        tracing::info!("Best cell: {} (cv_r2={:.4})", best_params, best_cv);

        // ── Refit the winner on the full training split ───────────────────────
        let mut model = GbdtRegressor::new(best_params);
        model.fit(x_train, y_train)?;

        let scores = ScoreReport {
            rmse_train: metrics::rmse(model.predict(x_train).view(), y_train),
            rmse_test:  metrics::rmse(model.predict(x_test).view(), y_test),
            r2_train:   metrics::r2(model.predict(x_train).view(), y_train),
            r2_test:    metrics::r2(model.predict(x_test).view(), y_test),
        };
        tracing::info!("Refit scores: {}", scores);

        // ── Acceptance gate ───────────────────────────────────────────────────
        if scores.passes_gate(self.min_r2_test) {
            Ok(TrainOutcome::Accepted {
                model,
                params: best_params,
                scores,
            })
        } else {
            tracing::warn!(
                "Model rejected: test R2 {:.4} below gate {:.2}",
                scores.r2_test,
                self.min_r2_test
            );
            Ok(TrainOutcome::Rejected {
                best_params,
                scores,
            })
        }
    }
}

/// Contiguous fold boundaries; the first `rows % folds` folds take
/// the extra row each.
fn kfold_ranges(rows: usize, folds: usize) -> Vec<(usize, usize)> {
    let base = rows / folds;
    let rem  = rows % folds;
    let mut ranges = Vec::with_capacity(folds);
    let mut start = 0;
    for f in 0..folds {
        let len = base + usize::from(f < rem);
        ranges.push((start, start + len));
        start += len;
    }
    ranges
}

/// Fit on everything outside [lo, hi), score R² on the held-out
/// range. Runs on a rayon worker.
fn fold_score(
    x:      ArrayView2<f64>,
    y:      ArrayView1<f64>,
    lo:     usize,
    hi:     usize,
    params: GbdtParams,
) -> Result<f64> {
    let fit_idx: Vec<usize> = (0..x.nrows()).filter(|&i| i < lo || i >= hi).collect();
    let x_fit = x.select(Axis(0), &fit_idx);
    let y_fit = y.select(Axis(0), &fit_idx);
    let x_val = x.slice(s![lo..hi, ..]);
    let y_val = y.slice(s![lo..hi]);

    let mut model = GbdtRegressor::new(params);
    model.fit(x_fit.view(), y_fit.view())?;
    Ok(metrics::r2(model.predict(x_val).view(), y_val))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    /// Learnable surface: linear in two features, interleaved so
    /// train and test cover the same value range.
    fn learnable_split() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        let mut x_train = Vec::new();
        let mut y_train = Vec::new();
        let mut x_test  = Vec::new();
        let mut y_test  = Vec::new();
        for i in 0..80usize {
            let a = (i % 10) as f64;
            let b = (i / 10) as f64;
            let y = 4.0 * a + 7.0 * b + 10.0;
            if i % 4 == 0 {
                x_test.push([a, b]);
                y_test.push(y);
            } else {
                x_train.push([a, b]);
                y_train.push(y);
            }
        }
        (rows_to_array(&x_train), Array1::from(y_train),
         rows_to_array(&x_test),  Array1::from(y_test))
    }

    fn rows_to_array(rows: &[[f64; 2]]) -> Array2<f64> {
        let mut out = Array2::zeros((rows.len(), 2));
        for (i, row) in rows.iter().enumerate() {
            out[[i, 0]] = row[0];
            out[[i, 1]] = row[1];
        }
        out
    }

    fn tiny_grid() -> ParamGrid {
        let mut entries = BTreeMap::new();
        entries.insert("n_estimators".to_string(), vec![30.0, 60.0]);
        entries.insert("max_depth".to_string(), vec![2.0, 3.0]);
        ParamGrid::new(entries)
    }

    #[test]
    fn test_kfold_ranges_cover_everything_once() {
        let ranges = kfold_ranges(10, 3);
        assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);

        let ranges = kfold_ranges(9, 3);
        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 9)]);
    }

    #[test]
    fn test_expand_is_a_cartesian_product() {
        let cells = tiny_grid().expand(GbdtParams::default()).unwrap();
        assert_eq!(cells.len(), 4);
        // BTreeMap order: learning_rate absent, max_depth varies
        // slowest of the two listed names
        assert_eq!(cells[0].max_depth, 2);
        assert_eq!(cells[0].n_estimators, 30);
        assert_eq!(cells[3].max_depth, 3);
        assert_eq!(cells[3].n_estimators, 60);
        // untouched parameters keep their base value
        assert!((cells[0].learning_rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_grid_expands_to_the_base_cell() {
        let cells = ParamGrid::default().expand(GbdtParams::default()).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0], GbdtParams::default());
    }

    #[test]
    fn test_validate_rejects_unknown_names_before_fitting() {
        let mut entries = BTreeMap::new();
        entries.insert("gamma".to_string(), vec![1.0]);
        let err = ParamGrid::new(entries)
            .validate(GbdtParams::PARAM_NAMES)
            .unwrap_err();
        assert!(matches!(err, TrainingError::UnknownParameter { .. }));

        let mut entries = BTreeMap::new();
        entries.insert("max_depth".to_string(), vec![]);
        let err = ParamGrid::new(entries)
            .validate(GbdtParams::PARAM_NAMES)
            .unwrap_err();
        assert!(matches!(err, TrainingError::EmptyCandidates { .. }));
    }

    #[test]
    fn test_search_accepts_a_learnable_problem() {
        let (x_train, y_train, x_test, y_test) = learnable_split();
        let trainer = GridSearchTrainer::new(3, 0.6);
        let outcome = trainer
            .search(
                &tiny_grid(),
                x_train.view(),
                y_train.view(),
                x_test.view(),
                y_test.view(),
            )
            .unwrap();

        assert!(outcome.is_accepted());
        assert!(outcome.scores().r2_test > 0.6);
    }

    #[test]
    fn test_search_rejects_noise_without_erroring() {
        // Deterministic pseudo-noise target: nothing to learn
        let n = 48usize;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        let mut state: u64 = 12345;
        for i in 0..n {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            x[[i, 0]] = (i % 8) as f64;
            x[[i, 1]] = (i / 8) as f64;
            y[i] = (state >> 33) as f64 / 1e6;
        }
        let x_test = x.slice(s![..12, ..]);
        let y_test = y.slice(s![..12]);
        let x_train = x.slice(s![12.., ..]);
        let y_train = y.slice(s![12..]);

        let trainer = GridSearchTrainer::new(3, 0.6);
        let outcome = trainer
            .search(&tiny_grid(), x_train, y_train, x_test, y_test)
            .unwrap();

        match outcome {
            TrainOutcome::Rejected { scores, .. } => assert!(scores.r2_test < 0.6),
            TrainOutcome::Accepted { .. } => panic!("noise must not pass the gate"),
        }
    }

    #[test]
    fn test_cancelled_token_stops_before_the_first_cell() {
        let (x_train, y_train, x_test, y_test) = learnable_split();
        let cancel = CancelToken::new();
        cancel.cancel();

        let trainer = GridSearchTrainer::new(3, 0.6).with_cancel(cancel);
        let err = trainer
            .search(
                &tiny_grid(),
                x_train.view(),
                y_train.view(),
                x_test.view(),
                y_test.view(),
            )
            .unwrap_err();

        match err.downcast_ref::<TrainingError>() {
            Some(TrainingError::Cancelled { completed: 0, total: 4 }) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn test_too_few_rows_for_the_folds_is_an_error() {
        let x = Array2::<f64>::zeros((2, 2));
        let y = Array1::<f64>::zeros(2);
        let trainer = GridSearchTrainer::new(3, 0.6);
        let err = trainer
            .search(&ParamGrid::default(), x.view(), y.view(), x.view(), y.view())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainingError>(),
            Some(TrainingError::InsufficientData { rows: 2, folds: 3 })
        ));
    }
}
