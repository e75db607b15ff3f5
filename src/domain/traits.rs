// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Traits are Rust's way of defining shared behaviour —
// similar to interfaces in Java or abstract classes in Python.
//
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code
// that uses them. For example:
//   - CsvTable implements TableSource
//   - A future DbTable could also implement TableSource
//   - The application layer only sees TableSource
//     and works with both without any changes
//
// This is the Dependency Inversion Principle from SOLID,
// applied using Rust's trait system.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Object Oriented Patterns)

use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::domain::error::IngestionError;
use crate::domain::record::RawRecord;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// Any component that can load one typed source table.
///
/// Implementations:
///   - CsvTable<SalesRow>    → data/raw/sales.csv
///   - CsvTable<FeaturesRow> → data/raw/features.csv
///   - CsvTable<StoresRow>   → data/raw/stores.csv
pub trait TableSource {
    /// The row type this table produces.
    type Row;

    /// Load every row, or fail with a fatal ingestion error.
    /// A malformed row aborts the load: a forecasting run on a
    /// silently truncated table is worse than no run.
    fn load(&self) -> Result<Vec<Self::Row>, IngestionError>;
}

// ─── Estimator ────────────────────────────────────────────────────────────────
/// The pluggable regression algorithm behind a fit/predict contract.
///
/// The pipeline never depends on which algorithm is used; it only
/// requires positional feature matrices in the canonical column
/// order and scalar predictions back.
///
/// Implementations:
///   - GbdtRegressor → gradient-boosted regression trees
pub trait Estimator {
    /// Hyperparameter names this estimator accepts. A search grid
    /// is validated against this list before any fitting starts.
    fn accepted_params(&self) -> &'static [&'static str];

    /// Fit on a feature matrix and its aligned targets.
    fn fit(&mut self, features: ArrayView2<f64>, targets: ArrayView1<f64>) -> Result<()>;

    /// Predict one canonical feature row.
    fn predict_row(&self, row: ArrayView1<f64>) -> f64;

    /// Predict every row of a feature matrix.
    fn predict(&self, features: ArrayView2<f64>) -> Array1<f64> {
        Array1::from_iter(features.rows().into_iter().map(|r| self.predict_row(r)))
    }
}

// ─── SalesPredictor ───────────────────────────────────────────────────────────
/// Any component that can turn one raw record into a forecast.
///
/// Implementations:
///   - Inferencer → loaded preprocessor + model artifact pair
pub trait SalesPredictor {
    /// Predict weekly sales for a single record.
    /// Fails if a required field is missing or a categorical
    /// level was never fitted; never substitutes silently.
    fn predict_sales(&self, record: &RawRecord) -> Result<f64>;
}
