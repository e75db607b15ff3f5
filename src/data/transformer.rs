// ============================================================
// Layer 4 — Feature Transformer
// ============================================================
// Turns raw merged records into the fixed 17-column numeric
// matrix the estimator consumes. This is the one component
// where training/serving skew is born or prevented, so it
// exposes two DISTINCT operations:
//
//   fit_transform(records)        — computes every statistic
//     from the given batch AND applies them. Called once per
//     training run, on the training split only.
//
//   transform(records, &state)    — applies a previously
//   transform_one(record, &state)   fitted state verbatim.
//     Never recomputes a mean, a level list, or a scale.
//     Used for the test split and every serving request.
//
// Running fit_transform on test or serving data would let a
// row's imputation and scaling depend on data that does not
// exist at serving time. The model would still run and would
// silently mispredict. There is deliberately no method here
// that refits from anything but the training batch.
//
// Transformation steps, in fixed order:
//   1. Calendar decomposition  Date → Month/Year/WeekOfYear
//   2. Markdown interpolation  per column over the batch,
//                              fitted-mean fallback
//   3. Numeric imputation      fitted means only
//   4. Categorical encoding    frozen sorted level lists;
//                              unseen level = typed error
//   5. Scaling                 fitted mean/std per column
//   6. Canonical assembly      FeatureColumn::ALL order,
//                              target carried alongside
//
// A bad record (missing Size, unseen level) is skipped with a
// warning and reported in the batch result; it never aborts
// the rest of the batch.
//
// Reference: Rust Book §5 (Structs), §13 (Iterators)

use std::collections::BTreeSet;

use chrono::Datelike;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::stats;
use crate::domain::error::TransformationError;
use crate::domain::record::RawRecord;
use crate::domain::schema::FeatureColumn;

/// Columns with spread below this are given scale 1.0 so a
/// constant column maps to 0.0 instead of dividing by zero.
const SCALE_EPS: f64 = 1e-12;

// ─── TransformerState ─────────────────────────────────────────────────────────
// Every statistic fitted during training, frozen. A new fit
// produces a new state; nothing here is ever updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerState {
    /// Canonical column names at fit time. A loaded state whose
    /// columns differ from this binary's schema must be refused.
    pub columns: Vec<String>,

    /// Imputation means for Temperature, Fuel_Price, CPI,
    /// Unemployment, in FeatureColumn::MEAN_IMPUTED order
    pub numeric_means: [f64; 4],

    /// Mean of each interpolated markdown column at fit time.
    /// The fallback when a batch cannot interpolate (a single
    /// serving row, or a column with no known value at all).
    pub markdown_means: [f64; 5],

    /// Sorted store-type levels; a value's code is its position
    pub type_levels: Vec<String>,

    /// Most frequent store type at fit time, used to fill gaps
    pub type_fill: String,

    /// Sorted holiday levels seen at fit (false < true)
    pub holiday_levels: Vec<bool>,

    /// Most frequent holiday flag at fit time
    pub holiday_fill: bool,

    /// Per-column scaler location, canonical order
    pub scale_mean: [f64; FeatureColumn::COUNT],

    /// Per-column scaler spread, canonical order (1.0 where the
    /// training column had no variance)
    pub scale_std: [f64; FeatureColumn::COUNT],
}

impl TransformerState {
    /// True when this state was fitted against the column layout
    /// this binary is compiled with.
    pub fn schema_matches(&self) -> bool {
        self.columns == FeatureColumn::names()
    }
}

// ─── FeatureBatch ─────────────────────────────────────────────────────────────
/// The result of transforming a batch: a canonical feature matrix,
/// targets aligned with its rows, and the records that had to be
/// skipped (with the reason each).
#[derive(Debug)]
pub struct FeatureBatch {
    /// (rows, FeatureColumn::COUNT) matrix in canonical order
    pub features: Array2<f64>,

    /// One entry per matrix row; None for rows without a target
    pub targets: Vec<Option<f64>>,

    /// Input index and reason for every record left out
    pub skipped: Vec<(usize, TransformationError)>,
}

impl FeatureBatch {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Split into (features, targets) for supervised training.
    /// Fails if any kept row is missing its target.
    pub fn supervised(self) -> Result<(Array2<f64>, Array1<f64>), TransformationError> {
        let missing = self.targets.iter().filter(|t| t.is_none()).count();
        if missing > 0 {
            return Err(TransformationError::MissingTarget { count: missing });
        }
        let targets = Array1::from_iter(self.targets.into_iter().flatten());
        Ok((self.features, targets))
    }
}

// ─── FeatureTransformer ───────────────────────────────────────────────────────
#[derive(Debug)]
pub struct FeatureTransformer;

impl FeatureTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Fit every statistic on `records` and transform them in one go.
    /// Call this exactly once per training run, on the training
    /// split only. Returns the feature batch plus the frozen state.
    pub fn fit_transform(
        &self,
        records: &[RawRecord],
    ) -> Result<(FeatureBatch, TransformerState), TransformationError> {
        // ── Step 1: Fit fill values, level lists, and means ───────────────────
        let mut state = fit_state(records)?;

        // ── Step 2: Assemble the unscaled matrix ──────────────────────────────
        // fit_state leaves an identity scale (mean 0, std 1), so this
        // runs the exact code path transform() uses and yields raw
        // column values.
        let mut batch = self.apply(records, &state);
        if batch.is_empty() {
            return Err(TransformationError::EmptyFit);
        }

        // ── Step 3: Fit the scaler on the assembled columns ───────────────────
        // Every canonical column is standardised, identifiers and
        // calendar fields included: the estimator sees one uniformly
        // scaled space.
        for c in 0..FeatureColumn::COUNT {
            let column: Vec<f64> = batch.features.column(c).to_vec();
            let mean = stats::mean(&column).unwrap_or(0.0);
            let std  = stats::population_std(&column, mean);
            state.scale_mean[c] = mean;
            state.scale_std[c]  = if std < SCALE_EPS { 1.0 } else { std };
        }

        // ── Step 4: Apply the freshly fitted scale ────────────────────────────
        for c in 0..FeatureColumn::COUNT {
            let mean = state.scale_mean[c];
            let std  = state.scale_std[c];
            batch.features.column_mut(c).mapv_inplace(|v| (v - mean) / std);
        }

        tracing::info!(
            "Fitted transformer on {} rows ({} skipped): {} type levels, {} holiday levels",
            batch.len(),
            batch.skipped.len(),
            state.type_levels.len(),
            state.holiday_levels.len(),
        );

        Ok((batch, state))
    }

    /// Transform a batch with a previously fitted state.
    /// No statistic is recomputed here; a batch transformed today
    /// and the same batch transformed next month produce identical
    /// matrices as long as the state is the same.
    pub fn transform(&self, records: &[RawRecord], state: &TransformerState) -> FeatureBatch {
        self.apply(records, state)
    }

    /// Transform a single record (the serving path).
    /// Missing markdowns fall back to the fitted means because a
    /// batch of one has nothing to interpolate against; any other
    /// problem surfaces as a typed error rather than a default.
    pub fn transform_one(
        &self,
        record: &RawRecord,
        state: &TransformerState,
    ) -> Result<Array1<f64>, TransformationError> {
        let markdowns = fallback_markdowns(record, state);
        let row = encode_row(record, &markdowns, state)?;
        Ok(Array1::from_iter(row))
    }

    /// Shared batch path for fit_transform and transform.
    /// Skips bad records, interpolates markdown columns over the
    /// kept rows, assembles and scales with the given state.
    fn apply(&self, records: &[RawRecord], state: &TransformerState) -> FeatureBatch {
        // Kept input indices, decided before interpolation so a
        // skipped record contributes nothing to its neighbours.
        let mut kept:    Vec<usize> = Vec::with_capacity(records.len());
        let mut skipped: Vec<(usize, TransformationError)> = Vec::new();

        for (i, record) in records.iter().enumerate() {
            match validate(record, state) {
                Ok(()) => kept.push(i),
                Err(e) => {
                    tracing::warn!("Skipping record {}: {}", i, e);
                    skipped.push((i, e));
                }
            }
        }

        // Markdown columns over the kept rows, in batch order.
        // Interpolation is recomputed per batch; only the fallback
        // means come from the fitted state.
        let mut markdown_cols: [Vec<Option<f64>>; 5] = Default::default();
        for (j, col) in markdown_cols.iter_mut().enumerate() {
            *col = kept.iter().map(|&i| records[i].markdowns[j]).collect();
            stats::interpolate_gaps(col);
        }

        let mut rows:    Vec<[f64; FeatureColumn::COUNT]> = Vec::with_capacity(kept.len());
        let mut targets: Vec<Option<f64>> = Vec::with_capacity(kept.len());

        for (pos, &i) in kept.iter().enumerate() {
            let mut markdowns = [0.0f64; 5];
            for j in 0..5 {
                markdowns[j] = markdown_cols[j][pos].unwrap_or(state.markdown_means[j]);
            }

            match encode_row(&records[i], &markdowns, state) {
                Ok(row) => {
                    rows.push(row);
                    targets.push(records[i].weekly_sales);
                }
                // validate() already screened the failure cases, but a
                // record that still fails here is skipped, not fatal
                Err(e) => {
                    tracing::warn!("Skipping record {}: {}", i, e);
                    skipped.push((i, e));
                }
            }
        }

        let mut features = Array2::zeros((rows.len(), FeatureColumn::COUNT));
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                features[[r, c]] = *value;
            }
        }

        FeatureBatch {
            features,
            targets,
            skipped,
        }
    }
}

impl Default for FeatureTransformer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Fitting ──────────────────────────────────────────────────────────────────

/// Compute every fitted statistic except the scaler (which needs
/// the assembled matrix first and starts as identity here).
fn fit_state(records: &[RawRecord]) -> Result<TransformerState, TransformationError> {
    let usable: Vec<&RawRecord> = records.iter().filter(|r| r.size.is_some()).collect();
    if usable.is_empty() {
        return Err(TransformationError::EmptyFit);
    }

    // Imputation means over the present values of each signal column
    let mut numeric_means = [0.0f64; 4];
    for (k, col) in FeatureColumn::MEAN_IMPUTED.iter().enumerate() {
        let values: Vec<Option<f64>> = usable.iter().map(|r| numeric_field(r, *col)).collect();
        numeric_means[k] = match stats::mean_present(&values) {
            Some(m) => m,
            None => {
                tracing::warn!("Column {} has no values at fit time, mean set to 0", col.name());
                0.0
            }
        };
    }

    // Markdown means are taken AFTER interpolating the training
    // columns, so the serving fallback matches what training saw
    let mut markdown_means = [0.0f64; 5];
    for (j, mean) in markdown_means.iter_mut().enumerate() {
        let mut column: Vec<Option<f64>> = usable.iter().map(|r| r.markdowns[j]).collect();
        stats::interpolate_gaps(&mut column);
        *mean = match stats::mean_present(&column) {
            Some(m) => m,
            None => {
                tracing::warn!("MarkDown{} has no values at fit time, mean set to 0", j + 1);
                0.0
            }
        };
    }

    // Store type: most frequent value fills gaps, then the filled
    // column defines the frozen sorted level list
    let type_fill = stats::most_frequent(usable.iter().filter_map(|r| r.store_type.clone()))
        .unwrap_or_else(|| {
            tracing::warn!("No store type seen at fit time");
            String::new()
        });
    let type_levels: Vec<String> = usable
        .iter()
        .map(|r| r.store_type.clone().unwrap_or_else(|| type_fill.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Holiday flag, same treatment (false sorts before true)
    let holiday_fill = stats::most_frequent(usable.iter().filter_map(|r| r.is_holiday))
        .unwrap_or(false);
    let holiday_levels: Vec<bool> = usable
        .iter()
        .map(|r| r.is_holiday.unwrap_or(holiday_fill))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(TransformerState {
        columns: FeatureColumn::names(),
        numeric_means,
        markdown_means,
        type_levels,
        type_fill,
        holiday_levels,
        holiday_fill,
        scale_mean: [0.0; FeatureColumn::COUNT],
        scale_std:  [1.0; FeatureColumn::COUNT],
    })
}

// ─── Per-record assembly ──────────────────────────────────────────────────────

/// Screen one record against the fitted state before assembly.
fn validate(record: &RawRecord, state: &TransformerState) -> Result<(), TransformationError> {
    if record.size.is_none() {
        return Err(TransformationError::MissingField {
            store: record.store,
            dept:  record.dept,
            field: "Size",
        });
    }

    if let Some(t) = &record.store_type {
        if !state.type_levels.iter().any(|l| l == t) {
            return Err(TransformationError::UnseenCategory {
                store:  record.store,
                dept:   record.dept,
                column: "Type",
                value:  t.clone(),
                known:  state.type_levels.clone(),
            });
        }
    }

    if let Some(h) = record.is_holiday {
        if !state.holiday_levels.contains(&h) {
            return Err(TransformationError::UnseenCategory {
                store:  record.store,
                dept:   record.dept,
                column: "IsHoliday",
                value:  h.to_string(),
                known:  state.holiday_levels.iter().map(|l| l.to_string()).collect(),
            });
        }
    }

    Ok(())
}

/// Assemble one scaled canonical row. `markdowns` must already be
/// resolved (interpolated or fallback-filled) by the caller.
fn encode_row(
    record:    &RawRecord,
    markdowns: &[f64; 5],
    state:     &TransformerState,
) -> Result<[f64; FeatureColumn::COUNT], TransformationError> {
    let size = record.size.ok_or(TransformationError::MissingField {
        store: record.store,
        dept:  record.dept,
        field: "Size",
    })?;

    let type_value = record
        .store_type
        .clone()
        .unwrap_or_else(|| state.type_fill.clone());
    let type_code = state
        .type_levels
        .iter()
        .position(|l| *l == type_value)
        .ok_or_else(|| TransformationError::UnseenCategory {
            store:  record.store,
            dept:   record.dept,
            column: "Type",
            value:  type_value.clone(),
            known:  state.type_levels.clone(),
        })? as f64;

    let holiday_value = record.is_holiday.unwrap_or(state.holiday_fill);
    let holiday_code = state
        .holiday_levels
        .iter()
        .position(|l| *l == holiday_value)
        .ok_or_else(|| TransformationError::UnseenCategory {
            store:  record.store,
            dept:   record.dept,
            column: "IsHoliday",
            value:  holiday_value.to_string(),
            known:  state.holiday_levels.iter().map(|l| l.to_string()).collect(),
        })? as f64;

    // The exhaustive match is the point: adding a column to the
    // schema refuses to compile until every producer handles it.
    let mut row = [0.0f64; FeatureColumn::COUNT];
    for col in FeatureColumn::ALL {
        let raw = match col {
            FeatureColumn::Month        => record.date.month() as f64,
            FeatureColumn::Year         => record.date.year() as f64,
            FeatureColumn::WeekOfYear   => record.date.iso_week().week() as f64,
            FeatureColumn::Temperature  => record.temperature.unwrap_or(state.numeric_means[0]),
            FeatureColumn::FuelPrice    => record.fuel_price.unwrap_or(state.numeric_means[1]),
            FeatureColumn::Cpi          => record.cpi.unwrap_or(state.numeric_means[2]),
            FeatureColumn::Unemployment => record.unemployment.unwrap_or(state.numeric_means[3]),
            FeatureColumn::StoreType    => type_code,
            FeatureColumn::IsHoliday    => holiday_code,
            FeatureColumn::MarkDown1    => markdowns[0],
            FeatureColumn::MarkDown2    => markdowns[1],
            FeatureColumn::MarkDown3    => markdowns[2],
            FeatureColumn::MarkDown4    => markdowns[3],
            FeatureColumn::MarkDown5    => markdowns[4],
            FeatureColumn::Store        => record.store as f64,
            FeatureColumn::Dept         => record.dept as f64,
            FeatureColumn::Size         => size,
        };
        let c = col.index();
        row[c] = (raw - state.scale_mean[c]) / state.scale_std[c];
    }

    Ok(row)
}

fn numeric_field(record: &RawRecord, col: FeatureColumn) -> Option<f64> {
    match col {
        FeatureColumn::Temperature  => record.temperature,
        FeatureColumn::FuelPrice    => record.fuel_price,
        FeatureColumn::Cpi          => record.cpi,
        FeatureColumn::Unemployment => record.unemployment,
        _ => None,
    }
}

/// Single-record markdown resolution: present values pass through,
/// gaps take the fitted means (nothing to interpolate against).
fn fallback_markdowns(record: &RawRecord, state: &TransformerState) -> [f64; 5] {
    let mut out = [0.0f64; 5];
    for j in 0..5 {
        out[j] = record.markdowns[j].unwrap_or(state.markdown_means[j]);
    }
    out
}
