// ============================================================
// Layer 4 — Column Statistics
// ============================================================
// Small numeric helpers used by the feature transformer:
// means, population standard deviation, mode, and linear
// gap interpolation.
//
// All of these operate on plain slices so they are trivially
// testable and carry no knowledge of which column they serve.
// The transformer decides which statistic applies to which
// column and when it may be computed (fit time only).
//
// Reference: Rust Book §13 (Iterators)

use std::collections::BTreeMap;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean over the present values of an optional column.
/// `None` when every value is missing.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    mean(&present)
}

/// Population standard deviation (divide by n, not n-1).
/// This is the scaler convention: the fitted scale describes the
/// training batch itself, not an estimate of a wider population.
pub fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Most frequent value. Ties resolve to the smallest value, so the
/// result is deterministic regardless of input order.
pub fn most_frequent<T: Ord>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending key order, so a strictly-greater
    // comparison keeps the smallest key among equally frequent ones.
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

/// Fill the gaps of one column in place.
///
/// Interior gaps are linearly interpolated between the nearest known
/// neighbours; gaps before the first known value take that first
/// value, gaps after the last known value take the last one.
/// A column with no known value at all is left untouched — the
/// caller must fall back to a fitted default.
pub fn interpolate_gaps(column: &mut [Option<f64>]) {
    let known: Vec<(usize, f64)> = column
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();

    if known.is_empty() {
        return;
    }

    // k counts the known points at positions <= i, so known[k-1] is
    // the nearest known value before i and known[k] the nearest after.
    let mut k = 0usize;
    for i in 0..column.len() {
        if column[i].is_some() {
            k += 1;
            continue;
        }

        let prev = if k > 0 { Some(known[k - 1]) } else { None };
        let next = if k < known.len() { Some(known[k]) } else { None };

        column[i] = Some(match (prev, next) {
            (Some((pi, pv)), Some((ni, nv))) => {
                let t = (i - pi) as f64 / (ni - pi) as f64;
                pv + t * (nv - pv)
            }
            (Some((_, pv)), None) => pv,
            (None, Some((_, nv))) => nv,
            // known is non-empty, so one neighbour always exists
            (None, None) => unreachable!(),
        });
    }
}
