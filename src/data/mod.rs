// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw CSV files all the
// way to the numeric matrix the estimator consumes.
//
// The pipeline flows in this order:
//
//   sales.csv  features.csv  stores.csv
//       │           │            │
//       └───────────┼────────────┘
//                   ▼
//   CsvTable        → reads each table, maps NA to None
//       │
//       ▼
//   assembler       → joins the three tables into one record
//       │              per (store, dept, week), plus the
//       │              future frame to forecast
//       ▼
//   splitter        → shuffles and splits train/test
//       │
//       ▼
//   FeatureTransformer → fits imputation, encoding and
//       │                scaling on train; replays the
//       │                frozen state everywhere else
//       ▼
//   FeatureBatch    → 17-column matrix + targets
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads the three CSV tables using csv + serde
pub mod loader;

/// Joins sales, features and stores into modelling records
pub mod assembler;

/// Shuffles and splits records into train/test sets
pub mod splitter;

/// Means, population std, interpolation, most-frequent value
pub mod stats;

/// Fit-once / replay-everywhere feature transformation
pub mod transformer;
