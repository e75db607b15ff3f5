use anyhow::{ensure, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainingError;
use crate::domain::traits::Estimator;

/// Split gains below this are noise; a node that cannot beat it
/// becomes a leaf.
const SPLIT_EPS: f64 = 1e-12;

// NOTE: every step in here is deterministic — same matrix in, same
// ensemble out. There is no RNG to seed and no parallel fold whose
// ordering could leak into the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    pub n_estimators:     usize,
    pub learning_rate:    f64,
    pub max_depth:        usize,
    pub min_samples_leaf: usize,
}

impl GbdtParams {
    /// Names a search grid may tune, validated before any fitting.
    pub const PARAM_NAMES: &'static [&'static str] = &[
        "n_estimators",
        "learning_rate",
        "max_depth",
        "min_samples_leaf",
    ];

    /// Return a copy with one named parameter overridden by a grid
    /// value. Counts must be positive integers; rates positive.
    pub fn with_param(self, name: &str, value: f64) -> Result<Self, TrainingError> {
        let invalid = || TrainingError::InvalidValue {
            name: name.to_string(),
            value,
        };
        let count = |v: f64| {
            if v.is_finite() && v >= 1.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(invalid())
            }
        };

        let mut params = self;
        match name {
            "n_estimators"     => params.n_estimators = count(value)?,
            "max_depth"        => params.max_depth = count(value)?,
            "min_samples_leaf" => params.min_samples_leaf = count(value)?,
            "learning_rate" => {
                if !(value.is_finite() && value > 0.0) {
                    return Err(invalid());
                }
                params.learning_rate = value;
            }
            _ => {
                return Err(TrainingError::UnknownParameter {
                    name:     name.to_string(),
                    accepted: Self::PARAM_NAMES,
                })
            }
        }
        Ok(params)
    }
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators:     100,
            learning_rate:    0.1,
            max_depth:        3,
            min_samples_leaf: 1,
        }
    }
}

impl std::fmt::Display for GbdtParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n_estimators={} learning_rate={} max_depth={} min_samples_leaf={}",
            self.n_estimators, self.learning_rate, self.max_depth, self.min_samples_leaf
        )
    }
}

// ─── RegressionTree ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      Box<TreeNode>,
        right:     Box<TreeNode>,
    },
}

/// One depth-limited regression tree, grown greedily by variance
/// reduction. The building block the booster stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    root: TreeNode,
}

impl RegressionTree {
    fn fit(features: ArrayView2<f64>, residuals: ArrayView1<f64>, params: &GbdtParams) -> Self {
        let indices: Vec<usize> = (0..features.nrows()).collect();
        Self {
            root: grow(features, residuals, &indices, params, 0),
        }
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn grow(
    features:  ArrayView2<f64>,
    residuals: ArrayView1<f64>,
    indices:   &[usize],
    params:    &GbdtParams,
    depth:     usize,
) -> TreeNode {
    let mean = node_mean(residuals, indices);
    if depth >= params.max_depth || indices.len() < 2 * params.min_samples_leaf {
        return TreeNode::Leaf { value: mean };
    }
    match best_split(features, residuals, indices, params.min_samples_leaf) {
        Some((feature, threshold)) => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| features[[i, feature]] <= threshold);
            TreeNode::Split {
                feature,
                threshold,
                left:  Box::new(grow(features, residuals, &left_idx, params, depth + 1)),
                right: Box::new(grow(features, residuals, &right_idx, params, depth + 1)),
            }
        }
        None => TreeNode::Leaf { value: mean },
    }
}

fn node_mean(residuals: ArrayView1<f64>, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| residuals[i]).sum::<f64>() / indices.len() as f64
}

/// Exhaustive scan over every feature and every boundary between
/// distinct values; picks the (feature, threshold) with the lowest
/// summed squared error. Ties keep the first candidate scanned, so
/// the choice is stable run to run.
fn best_split(
    features:  ArrayView2<f64>,
    residuals: ArrayView1<f64>,
    indices:   &[usize],
    min_leaf:  usize,
) -> Option<(usize, f64)> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let total_sq:  f64 = indices.iter().map(|&i| residuals[i] * residuals[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;
    if parent_sse <= SPLIT_EPS {
        // node is already pure
        return None;
    }

    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..features.ncols() {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| features[[a, feature]].total_cmp(&features[[b, feature]]));

        // Prefix sums let every candidate boundary cost O(1)
        let mut left_sum = 0.0;
        let mut left_sq  = 0.0;
        for k in 1..n {
            let r = residuals[order[k - 1]];
            left_sum += r;
            left_sq  += r * r;

            let prev = features[[order[k - 1], feature]];
            let next = features[[order[k], feature]];
            if next <= prev {
                // equal values: no boundary to split on
                continue;
            }
            if k < min_leaf || n - k < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq  = total_sq - left_sq;
            let cost = (left_sq - left_sum * left_sum / k as f64)
                + (right_sq - right_sum * right_sum / (n - k) as f64);

            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, feature, prev + (next - prev) / 2.0));
            }
        }
    }

    best.filter(|&(cost, _, _)| parent_sse - cost > SPLIT_EPS)
        .map(|(_, feature, threshold)| (feature, threshold))
}

// ─── GbdtRegressor ────────────────────────────────────────────────────────────

/// Gradient-boosted regression trees. Starts from the target mean
/// and stacks trees, each fitted to what the ensemble so far still
/// gets wrong, shrunk by the learning rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtRegressor {
    pub params:      GbdtParams,
    base_prediction: f64,
    trees:           Vec<RegressionTree>,
}

impl GbdtRegressor {
    pub fn new(params: GbdtParams) -> Self {
        Self {
            params,
            base_prediction: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Default for GbdtRegressor {
    fn default() -> Self {
        Self::new(GbdtParams::default())
    }
}

impl Estimator for GbdtRegressor {
    fn accepted_params(&self) -> &'static [&'static str] {
        GbdtParams::PARAM_NAMES
    }

    fn fit(&mut self, features: ArrayView2<f64>, targets: ArrayView1<f64>) -> Result<()> {
        ensure!(
            features.nrows() == targets.len(),
            "feature rows ({}) and targets ({}) differ",
            features.nrows(),
            targets.len()
        );
        ensure!(features.nrows() > 0, "cannot fit on an empty matrix");

        self.base_prediction = targets.sum() / targets.len() as f64;
        self.trees = Vec::with_capacity(self.params.n_estimators);

        // current[i] = ensemble prediction for row i so far
        let mut current = Array1::from_elem(targets.len(), self.base_prediction);
        for _ in 0..self.params.n_estimators {
            let residuals: Array1<f64> = targets
                .iter()
                .zip(current.iter())
                .map(|(y, f)| y - f)
                .collect();
            let tree = RegressionTree::fit(features, residuals.view(), &self.params);
            for (i, row) in features.rows().into_iter().enumerate() {
                current[i] += self.params.learning_rate * tree.predict_row(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let boost: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        self.base_prediction + self.params.learning_rate * boost
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics;
    use ndarray::{Array1, Array2};

    /// Deterministic 2-feature surface, linear in both.
    fn grid_data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let a = (i % 10) as f64;
            let b = (i / 10) as f64;
            x[[i, 0]] = a;
            x[[i, 1]] = b;
            y[i] = 3.0 * a - 2.0 * b + 5.0;
        }
        (x, y)
    }

    #[test]
    fn test_fits_a_linear_surface() {
        let (x, y) = grid_data();
        let mut model = GbdtRegressor::new(GbdtParams {
            n_estimators:     150,
            learning_rate:    0.2,
            max_depth:        3,
            min_samples_leaf: 1,
        });
        model.fit(x.view(), y.view()).unwrap();

        let predicted = model.predict(x.view());
        assert!(metrics::r2(predicted.view(), y.view()) > 0.95);
        assert_eq!(model.n_trees(), 150);
    }

    #[test]
    fn test_constant_target_is_reproduced_exactly() {
        let (x, _) = grid_data();
        let y = Array1::from_elem(x.nrows(), 7.0);
        let mut model = GbdtRegressor::default();
        model.fit(x.view(), y.view()).unwrap();

        // base prediction 7, every tree a pure-node leaf of 0
        for row in x.rows() {
            assert!((model.predict_row(row) - 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = grid_data();
        let mut a = GbdtRegressor::default();
        let mut b = GbdtRegressor::default();
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();

        assert_eq!(a.predict(x.view()), b.predict(x.view()));
    }

    #[test]
    fn test_fit_rejects_bad_shapes() {
        let (x, y) = grid_data();
        let mut model = GbdtRegressor::default();

        assert!(model.fit(x.view(), y.slice(ndarray::s![..10]).view()).is_err());

        let empty_x = Array2::<f64>::zeros((0, 2));
        let empty_y = Array1::<f64>::zeros(0);
        assert!(model.fit(empty_x.view(), empty_y.view()).is_err());
    }

    #[test]
    fn test_with_param_overrides_and_validates() {
        let base = GbdtParams::default();

        let tuned = base.with_param("learning_rate", 0.05).unwrap();
        assert!((tuned.learning_rate - 0.05).abs() < 1e-12);
        assert_eq!(tuned.n_estimators, base.n_estimators);

        let tuned = base.with_param("n_estimators", 250.0).unwrap();
        assert_eq!(tuned.n_estimators, 250);

        match base.with_param("gamma", 1.0).unwrap_err() {
            TrainingError::UnknownParameter { name, accepted } => {
                assert_eq!(name, "gamma");
                assert!(accepted.contains(&"max_depth"));
            }
            other => panic!("expected UnknownParameter, got {other:?}"),
        }

        assert!(matches!(
            base.with_param("n_estimators", 0.0).unwrap_err(),
            TrainingError::InvalidValue { .. }
        ));
        assert!(matches!(
            base.with_param("max_depth", 2.5).unwrap_err(),
            TrainingError::InvalidValue { .. }
        ));
        assert!(matches!(
            base.with_param("learning_rate", -0.1).unwrap_err(),
            TrainingError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = grid_data();
        let mut model = GbdtRegressor::new(GbdtParams {
            n_estimators: 20,
            ..GbdtParams::default()
        });
        model.fit(x.view(), y.view()).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let reloaded: GbdtRegressor = serde_json::from_str(&json).unwrap();

        assert_eq!(model.predict(x.view()), reloaded.predict(x.view()));
    }

    #[test]
    fn test_predict_matches_predict_row() {
        let (x, y) = grid_data();
        let mut model = GbdtRegressor::new(GbdtParams {
            n_estimators: 10,
            ..GbdtParams::default()
        });
        model.fit(x.view(), y.view()).unwrap();

        let batch = model.predict(x.view());
        for (i, row) in x.rows().into_iter().enumerate() {
            assert_eq!(batch[i], model.predict_row(row));
        }
    }
}
