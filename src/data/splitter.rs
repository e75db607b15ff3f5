// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Randomly shuffles records and splits them into two sets:
//   - Training set: the transformer and estimator are fit here
//   - Test set:     used only to evaluate the fitted model
//
// Why shuffle before splitting?
//   The assembled table is sorted by (store, dept, date).
//   Without shuffling, the test set would be the last stores
//   only and say nothing about the rest of the chain.
//
// Why a SEEDED generator?
//   Reruns of the same data must produce the same split, so a
//   reported score can be reproduced bit for bit. The seed is
//   part of the training configuration (default 11).
//
// NOTE on the protocol: this is a random row split of weekly
// observations, not a time-based split. For a time series that
// lets rows later than a test row appear in training, which can
// leak future information into the fit. It matches the
// established evaluation protocol for this dataset; changing it
// to a time-based split changes what the reported R² means and
// must be a deliberate decision, not a drive-by fix.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom,
// the standard unbiased shuffle algorithm.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle `records` with a seeded RNG and split into
/// (train, test) by `test_fraction`.
///
/// # Arguments
/// * `records`       - All historical records (consumed)
/// * `test_fraction` - Proportion held out for testing, e.g. 0.2
/// * `seed`          - RNG seed; same seed + same data = same split
pub fn split_train_test<T>(
    mut records:   Vec<T>,
    test_fraction: f64,
    seed:          u64,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);

    // Fisher-Yates shuffle — every permutation is equally likely
    records.shuffle(&mut rng);

    // e.g. 100 records * (1 - 0.2) = 80 → first 80 are training
    let total    = records.len();
    let split_at = ((total as f64) * (1.0 - test_fraction)).round() as usize;
    let split_at = split_at.min(total);

    // split_off(n) removes elements [n..] and returns them
    let test = records.split_off(split_at);

    tracing::debug!(
        "Split: {} train, {} test rows (seed {})",
        records.len(),
        test.len(),
        seed,
    );

    (records, test)
}
