// ============================================================
// Layer 5 — Inferencer
// ============================================================
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};

use crate::data::transformer::FeatureTransformer;
use crate::domain::record::RawRecord;
use crate::domain::traits::{Estimator, SalesPredictor};
use crate::infra::artifact_store::{ArtifactStore, LoadedPair};

/// Serves predictions from one loaded preprocessor/model pair.
///
/// The pair sits behind an RwLock'd Arc: `reload` swaps the
/// pointer, a prediction in flight keeps the pair it started
/// with, and the transformer state a row was built with is by
/// construction the one its model was trained on.
#[derive(Debug)]
pub struct Inferencer {
    transformer: FeatureTransformer,
    pair:        RwLock<Arc<LoadedPair>>,
}

impl Inferencer {
    /// Load whatever version the store currently promotes.
    pub fn from_store(store: &ArtifactStore) -> Result<Self> {
        let pair = store.load_latest()?;
        tracing::info!("Serving artifact v{} ({})", pair.version, pair.model.params);
        Ok(Self {
            transformer: FeatureTransformer::new(),
            pair:        RwLock::new(Arc::new(pair)),
        })
    }

    /// Swap in the newest promoted version without restarting.
    /// Returns the version now being served.
    pub fn reload(&self, store: &ArtifactStore) -> Result<u32> {
        let fresh = store.load_latest()?;
        let version = fresh.version;
        let mut guard = match self.pair.write() {
            Ok(guard) => guard,
            // a panicked reader cannot tear an Arc swap
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(fresh);
        tracing::info!("Reloaded artifact, now serving v{}", version);
        Ok(version)
    }

    pub fn version(&self) -> u32 {
        self.current().version
    }

    fn current(&self) -> Arc<LoadedPair> {
        match self.pair.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl SalesPredictor for Inferencer {
    fn predict_sales(&self, record: &RawRecord) -> Result<f64> {
        let pair = self.current();
        let row = self
            .transformer
            .transform_one(record, &pair.state)
            .with_context(|| {
                format!(
                    "cannot build features for store {} dept {} {}",
                    record.store, record.dept, record.date
                )
            })?;
        Ok(pair.model.predict_row(row.view()))
    }
}
