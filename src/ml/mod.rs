// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// This layer contains ALL learning-algorithm specific code.
// No other layer knows how the regressor works inside — the
// rest of the crate sees the Estimator trait and matrices.
//
// Why isolate the algorithm here?
//   - Swapping the regressor touches only this layer
//   - Other layers are testable with a stub estimator
//   - Model selection policy is clearly separated from
//     data preparation and application logic
//
// What's in this layer:
//
//   model.rs      — Gradient-boosted regression trees
//                   Depth-limited trees grown by variance
//                   reduction, stacked on residuals with a
//                   learning-rate shrinkage. Deterministic.
//
//   trainer.rs    — Grid search with k-fold cross-validation
//                   Validates the grid up front, scores every
//                   cell, refits the winner and applies the
//                   acceptance gate
//
//   metrics.rs    — RMSE / R² and the ScoreReport that every
//                   persisted version carries
//
//   inferencer.rs — Serves one loaded preprocessor/model pair,
//                   hot-swappable on reload
//
// Reference: Friedman (2001) Greedy Function Approximation
//            Rust Book §10 (Traits)

/// Gradient-boosted regression trees and their hyperparameters
pub mod model;

/// Grid search, cross-validation and the acceptance gate
pub mod trainer;

/// Regression metrics and the persisted score report
pub mod metrics;

/// Serving engine — loads an artifact pair and predicts sales
pub mod inferencer;
