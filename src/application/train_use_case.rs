// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the three source tables   (Layer 4 - data)
//   Step 2: Assemble modelling records     (Layer 4 - data)
//   Step 3: Split train/test               (Layer 4 - data)
//   Step 4: Fit the feature transformer    (Layer 4 - data)
//   Step 5: Transform the test split       (Layer 4 - data)
//   Step 6: Grid search + acceptance gate  (Layer 5 - ml)
//   Step 7: Persist and promote on accept  (Layer 6 - infra)
//
// The use case owns the one rule no layer below can enforce on
// its own: nothing is ever persisted for a rejected model, and
// fitting happens exactly once, on the training split.
//
// Reference: Rust Book §13 (Iterators and Closures)

use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    assembler::assemble,
    loader::{CsvTable, FeaturesRow, SalesRow, StoresRow},
    splitter::split_train_test,
    transformer::FeatureTransformer,
};
use crate::domain::traits::TableSource;
use crate::infra::artifact_store::ArtifactStore;
use crate::ml::trainer::{CancelToken, GridSearchTrainer, ParamGrid, TrainOutcome};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one training run depends on. Serialisable so a run
// can be reproduced from its config alone; there is no other
// source of pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub sales_path:    String,
    pub features_path: String,
    pub stores_path:   String,
    pub artifact_dir:  String,
    /// Fraction of historical rows held out for the test split
    pub test_ratio:    f64,
    /// Seed for the row shuffle; fixed so reruns split identically
    pub seed:          u64,
    pub cv_folds:      usize,
    /// Acceptance gate on held-out R²
    pub min_r2_test:   f64,
    /// Optional JSON grid file; the built-in grid when absent
    pub grid_path:     Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            sales_path:    "data/raw/sales.csv".to_string(),
            features_path: "data/raw/features.csv".to_string(),
            stores_path:   "data/raw/stores.csv".to_string(),
            artifact_dir:  "artifacts".to_string(),
            test_ratio:    0.2,
            seed:          11,
            cv_folds:      3,
            min_r2_test:   0.6,
            grid_path:     None,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
    cancel: CancelToken,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Handle the caller can use to abort the search between grid
    /// cells (e.g. wired to Ctrl-C).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the full training pipeline end to end. Returns the
    /// outcome so the caller can report acceptance or rejection.
    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Load the three source tables ─────────────────────────────
        tracing::info!("Loading source tables");
        let sales    = CsvTable::<SalesRow>::new(&cfg.sales_path).load()?;
        let features = CsvTable::<FeaturesRow>::new(&cfg.features_path).load()?;
        let stores   = CsvTable::<StoresRow>::new(&cfg.stores_path).load()?;
        tracing::info!(
            "Loaded {} sales, {} feature, {} store rows",
            sales.len(),
            features.len(),
            stores.len()
        );

        // ── Step 2: Assemble modelling records ───────────────────────────────
        // One record per (store, dept, week); feature rows dated
        // past the last sale become the future frame
        let frames = assemble(&sales, &features, &stores);
        tracing::info!(
            "Assembled {} historical records, {} future records",
            frames.historical.len(),
            frames.future.len()
        );

        // ── Step 3: Split train/test ─────────────────────────────────────────
        let (train_records, test_records) =
            split_train_test(frames.historical, cfg.test_ratio, cfg.seed);
        tracing::info!(
            "Split: {} train, {} test records",
            train_records.len(),
            test_records.len()
        );

        // ── Step 4: Fit the feature transformer on train ONLY ────────────────
        // Every statistic (means, level lists, scale) comes from
        // this one call; the test split never touches fitting
        let transformer = FeatureTransformer::new();
        let (train_batch, state) = transformer.fit_transform(&train_records)?;
        if !train_batch.skipped.is_empty() {
            tracing::warn!("{} training record(s) skipped", train_batch.skipped.len());
        }
        let (x_train, y_train) = train_batch.supervised()?;

        // ── Step 5: Transform the test split with the frozen state ───────────
        let test_batch = transformer.transform(&test_records, &state);
        if !test_batch.skipped.is_empty() {
            tracing::warn!("{} test record(s) skipped", test_batch.skipped.len());
        }
        let (x_test, y_test) = test_batch.supervised()?;

        // ── Step 6: Grid search, cross-validation, gate ──────────────────────
        let grid = self.load_grid()?;
        let trainer = GridSearchTrainer::new(cfg.cv_folds, cfg.min_r2_test)
            .with_cancel(self.cancel.clone());
        let outcome = trainer.search(
            &grid,
            x_train.view(),
            y_train.view(),
            x_test.view(),
            y_test.view(),
        )?;

        // ── Step 7: Persist and promote, on acceptance only ──────────────────
        match &outcome {
            TrainOutcome::Accepted {
                model,
                params,
                scores,
            } => {
                let store = ArtifactStore::new(&cfg.artifact_dir);
                let version = store.save_pair(&state, model, scores)?;
                tracing::info!("Promoted artifact v{} ({})", version, params);
            }
            TrainOutcome::Rejected {
                best_params,
                scores,
            } => {
                tracing::warn!(
                    "Nothing persisted: best cell ({}) scored {}",
                    best_params,
                    scores
                );
            }
        }

        Ok(outcome)
    }

    fn load_grid(&self) -> Result<ParamGrid> {
        match &self.config.grid_path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("cannot read grid file '{path}'"))?;
                let grid: ParamGrid = serde_json::from_str(&text)
                    .with_context(|| format!("grid file '{path}' is not a JSON map of candidate lists"))?;
                tracing::info!("Using grid from '{}'", path);
                Ok(grid)
            }
            None => {
                tracing::info!("Using built-in default grid");
                Ok(ParamGrid::default_search())
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::RawRecord;
    use crate::domain::traits::SalesPredictor;
    use crate::ml::inferencer::Inferencer;
    use chrono::{Duration, NaiveDate};
    use std::fmt::Write as _;
    use std::path::Path;

    const WEEKS:  usize = 15;
    const STORES: u32 = 4;
    const DEPTS:  u32 = 2;

    fn week(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 7, 6).unwrap() + Duration::weeks(i as i64)
    }

    fn store_size(store: u32) -> f64 {
        180000.0 - 30000.0 * store as f64
    }

    /// Learnable sales: driven by store size, department and a
    /// weekly trend, with zero noise.
    fn sales_value(store: u32, dept: u32, week_idx: usize) -> f64 {
        store_size(store) / 50.0 + 800.0 * dept as f64 + 30.0 * week_idx as f64
    }

    /// Write the three source CSVs plus two future feature weeks.
    fn write_sources(dir: &Path) -> (String, String, String) {
        let mut sales = String::from("Store,Dept,Date,Weekly_Sales,IsHoliday\n");
        for store in 1..=STORES {
            for dept in 1..=DEPTS {
                for w in 0..WEEKS {
                    let holiday = if w == 5 { "TRUE" } else { "FALSE" };
                    writeln!(
                        sales,
                        "{store},{dept},{},{:.2},{holiday}",
                        week(w),
                        sales_value(store, dept, w)
                    )
                    .unwrap();
                }
            }
        }

        let mut features = String::from(
            "Store,Date,Temperature,Fuel_Price,MarkDown1,MarkDown2,MarkDown3,MarkDown4,MarkDown5,CPI,Unemployment,IsHoliday\n",
        );
        for store in 1..=STORES {
            // two extra weeks past the last sale form the future frame
            for w in 0..WEEKS + 2 {
                let holiday = if w == 5 { "TRUE" } else { "FALSE" };
                let markdown1 = if w % 3 == 0 {
                    format!("{:.1}", 500.0 + 10.0 * w as f64)
                } else {
                    "NA".to_string()
                };
                writeln!(
                    features,
                    "{store},{},{:.1},{:.2},{markdown1},NA,NA,NA,NA,{:.1},{:.1},{holiday}",
                    week(w),
                    40.0 + 2.0 * w as f64 + store as f64,
                    3.0 + 0.05 * store as f64,
                    120.0 + 0.1 * w as f64,
                    8.0 - 0.02 * w as f64,
                )
                .unwrap();
            }
        }

        let mut stores = String::from("Store,Type,Size\n");
        for store in 1..=STORES {
            let kind = if store <= 2 { "A" } else { "B" };
            writeln!(stores, "{store},{kind},{}", store_size(store) as u64).unwrap();
        }

        let sales_path    = dir.join("sales.csv");
        let features_path = dir.join("features.csv");
        let stores_path   = dir.join("stores.csv");
        fs::write(&sales_path, sales).unwrap();
        fs::write(&features_path, features).unwrap();
        fs::write(&stores_path, stores).unwrap();
        (
            sales_path.display().to_string(),
            features_path.display().to_string(),
            stores_path.display().to_string(),
        )
    }

    fn config_for(dir: &Path) -> TrainConfig {
        let (sales_path, features_path, stores_path) = write_sources(dir);
        let grid_path = dir.join("grid.json");
        fs::write(
            &grid_path,
            r#"{"n_estimators": [40], "learning_rate": [0.15], "max_depth": [3]}"#,
        )
        .unwrap();

        TrainConfig {
            sales_path,
            features_path,
            stores_path,
            artifact_dir: dir.join("artifacts").display().to_string(),
            grid_path: Some(grid_path.display().to_string()),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_train_promotes_and_serves() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let artifact_dir = cfg.artifact_dir.clone();

        let outcome = TrainUseCase::new(cfg).execute().unwrap();
        assert!(outcome.is_accepted(), "scores: {}", outcome.scores());
        assert!(outcome.scores().r2_test > 0.6);

        // the accepted pair is promoted and serves a future week
        let store = ArtifactStore::new(&artifact_dir);
        let inferencer = Inferencer::from_store(&store).unwrap();
        assert_eq!(inferencer.version(), 1);

        let mut future = RawRecord::new(1, 1, week(WEEKS));
        future.is_holiday   = Some(false);
        future.temperature  = Some(40.0 + 2.0 * WEEKS as f64 + 1.0);
        future.fuel_price   = Some(3.05);
        future.cpi          = Some(120.0 + 0.1 * WEEKS as f64);
        future.unemployment = Some(8.0 - 0.02 * WEEKS as f64);
        future.markdowns    = [Some(500.0 + 10.0 * WEEKS as f64), None, None, None, None];
        future.store_type   = Some("A".to_string());
        future.size         = Some(store_size(1));

        let forecast = inferencer.predict_sales(&future).unwrap();
        assert!(forecast.is_finite());
        assert!(forecast > 0.0);
    }

    #[test]
    fn test_unlearnable_target_is_rejected_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_for(dir.path());

        // replace sales with deterministic pseudo-noise
        let mut sales = String::from("Store,Dept,Date,Weekly_Sales,IsHoliday\n");
        let mut state: u64 = 99;
        for store in 1..=STORES {
            for dept in 1..=DEPTS {
                for w in 0..WEEKS {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    writeln!(
                        sales,
                        "{store},{dept},{},{:.2},FALSE",
                        week(w),
                        (state >> 40) as f64
                    )
                    .unwrap();
                }
            }
        }
        fs::write(&cfg.sales_path, sales).unwrap();
        let artifact_dir = cfg.artifact_dir.clone();

        let outcome = TrainUseCase::new(cfg).execute().unwrap();
        assert!(!outcome.is_accepted());

        // a rejected run must leave no promoted artifact behind
        let store = ArtifactStore::new(&artifact_dir);
        assert!(matches!(
            store.load_latest().unwrap_err(),
            crate::domain::error::ArtifactError::NotFound { .. }
        ));
    }

    #[test]
    fn test_cancel_token_aborts_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_for(dir.path());
        // no grid file: covers the built-in default grid path too
        cfg.grid_path = None;

        let use_case = TrainUseCase::new(cfg);
        use_case.cancel_token().cancel();

        let err = use_case.execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::domain::error::TrainingError>(),
            Some(crate::domain::error::TrainingError::Cancelled { .. })
        ));
    }
}
