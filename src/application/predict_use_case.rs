// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// The serving path: load the promoted preprocessor/model pair
// once, then turn raw records into forecasts on demand. Every
// record goes through the same frozen transformer state the
// model was trained behind; there is nothing to fit here.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ArtifactError;
use crate::domain::record::RawRecord;
use crate::domain::traits::SalesPredictor;
use crate::infra::artifact_store::ArtifactStore;
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    pub artifact_dir: String,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            artifact_dir: "artifacts".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct PredictUseCase {
    inferencer: Inferencer,
}

impl PredictUseCase {
    /// Load the latest promoted artifact pair, failing with an
    /// actionable message when none has been trained yet.
    pub fn new(config: PredictConfig) -> Result<Self> {
        let store = ArtifactStore::new(&config.artifact_dir);
        let inferencer = Inferencer::from_store(&store).map_err(|e| {
            match e.downcast_ref::<ArtifactError>() {
                Some(ArtifactError::NotFound { .. }) => {
                    e.context("no promoted model found. Run 'train' first")
                }
                _ => e,
            }
        })?;
        Ok(Self { inferencer })
    }

    /// Forecast weekly sales for one record.
    pub fn predict(&self, record: &RawRecord) -> Result<f64> {
        let forecast = self.inferencer.predict_sales(record)?;
        tracing::info!(
            "store {} dept {} {}: forecast {:.2}",
            record.store,
            record.dept,
            record.date,
            forecast
        );
        Ok(forecast)
    }

    pub fn version(&self) -> u32 {
        self.inferencer.version()
    }
}
