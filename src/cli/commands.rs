// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → u32, f64, NaiveDate, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::application::predict_use_case::PredictConfig;
use crate::application::train_use_case::TrainConfig;
use crate::domain::record::RawRecord;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a forecasting model from the raw CSV tables
    Train(TrainArgs),

    /// Forecast weekly sales for one store/department/week
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// CSV with historical weekly sales per store and department
    #[arg(long, default_value = "data/raw/sales.csv")]
    pub sales: String,

    /// CSV with per-store weekly context (temperature, fuel, markdowns, ...)
    #[arg(long, default_value = "data/raw/features.csv")]
    pub features: String,

    /// CSV with static store metadata (type and size)
    #[arg(long, default_value = "data/raw/stores.csv")]
    pub stores: String,

    /// Directory to save versioned preprocessor/model pairs
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// Fraction of the historical data held out as the test split
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,

    /// Seed for the train/test shuffle — same seed, same split
    #[arg(long, default_value_t = 11)]
    pub seed: u64,

    /// Number of cross-validation folds per grid cell
    #[arg(long, default_value_t = 3)]
    pub cv_folds: usize,

    /// Minimum test-split R² a model must reach to be promoted
    #[arg(long, default_value_t = 0.6)]
    pub min_r2_test: f64,

    /// JSON file mapping parameter names to candidate values.
    /// Omit to search the built-in default grid.
    #[arg(long)]
    pub grid: Option<String>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            sales_path:    a.sales,
            features_path: a.features,
            stores_path:   a.stores,
            artifact_dir:  a.artifact_dir,
            test_ratio:    a.test_ratio,
            seed:          a.seed,
            cv_folds:      a.cv_folds,
            min_r2_test:   a.min_r2_test,
            grid_path:     a.grid,
        }
    }
}

/// All arguments for the `predict` command.
/// One flag per raw input field; anything the training data had
/// missing values for may be omitted here too, and the stored
/// preprocessor fills it exactly as it did at training time.
#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Store identifier
    #[arg(long)]
    pub store: u32,

    /// Department identifier
    #[arg(long)]
    pub dept: u32,

    /// Week being forecast, e.g. 2012-11-02
    #[arg(long)]
    pub date: NaiveDate,

    /// Mark the week as containing a major holiday
    #[arg(long, default_value_t = false)]
    pub holiday: bool,

    /// Average regional temperature in °F
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Regional fuel price in dollars
    #[arg(long)]
    pub fuel_price: Option<f64>,

    /// Promotional markdown 1
    #[arg(long)]
    pub markdown1: Option<f64>,

    /// Promotional markdown 2
    #[arg(long)]
    pub markdown2: Option<f64>,

    /// Promotional markdown 3
    #[arg(long)]
    pub markdown3: Option<f64>,

    /// Promotional markdown 4
    #[arg(long)]
    pub markdown4: Option<f64>,

    /// Promotional markdown 5
    #[arg(long)]
    pub markdown5: Option<f64>,

    /// Consumer price index for the region
    #[arg(long)]
    pub cpi: Option<f64>,

    /// Regional unemployment rate
    #[arg(long)]
    pub unemployment: Option<f64>,

    /// Store type label, one of the types seen at training time
    #[arg(long)]
    pub store_type: Option<String>,

    /// Store size in square feet
    #[arg(long)]
    pub size: f64,

    /// Directory where trained artifact pairs were saved
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,
}

impl PredictArgs {
    pub fn config(&self) -> PredictConfig {
        PredictConfig {
            artifact_dir: self.artifact_dir.clone(),
        }
    }
}

/// Assemble one raw record from the flags, exactly as the CSV
/// loader would have produced it.
impl From<&PredictArgs> for RawRecord {
    fn from(a: &PredictArgs) -> Self {
        let mut record = RawRecord::new(a.store, a.dept, a.date);
        record.is_holiday   = Some(a.holiday);
        record.temperature  = a.temperature;
        record.fuel_price   = a.fuel_price;
        record.cpi          = a.cpi;
        record.unemployment = a.unemployment;
        record.markdowns    = [a.markdown1, a.markdown2, a.markdown3, a.markdown4, a.markdown5];
        record.store_type   = a.store_type.clone();
        record.size         = Some(a.size);
        record
    }
}
