// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// A small closed set of error types, one per failure class,
// so callers can discriminate failures programmatically
// instead of parsing message strings.
//
// The classes and their blast radius:
//   IngestionError      — bad source data; aborts the whole run
//   TransformationError — bad record; fatal for that record only,
//                         a batch of otherwise-valid records survives
//   ArtifactError       — bad persisted state; blocks serving
//   TrainingError       — a fault during search (bad grid,
//                         cancellation, too little data)
//
// A model failing the promotion gate is NOT an error: it is a
// negative outcome carried by `TrainOutcome::Rejected` with its
// scores attached, so the caller can decide whether to retry.
//
// Reference: Rust Book §9 (Error Handling)
//            thiserror crate documentation

use thiserror::Error;

/// Fatal problems with the raw source tables.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The file could not be opened or read at all
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A column the join or the schema needs is absent from the header
    #[error("'{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },

    /// One row failed to parse; line is 1-based and counts the header
    #[error("'{path}' line {line}: {message}")]
    Row {
        path: String,
        line: usize,
        message: String,
    },

    /// A source table parsed cleanly but held no data rows
    #[error("'{path}' contains no data rows")]
    Empty { path: String },
}

/// Per-record failures while building feature vectors.
#[derive(Debug, Error)]
pub enum TransformationError {
    /// A field with no fitted fallback is absent from the record
    #[error("store {store} dept {dept}: required field '{field}' is missing")]
    MissingField {
        store: u32,
        dept: u32,
        field: &'static str,
    },

    /// A categorical value that was never seen during fitting.
    /// Never silently mapped onto an existing code.
    #[error("store {store} dept {dept}: unseen {column} level '{value}' (fitted levels: {known:?})")]
    UnseenCategory {
        store: u32,
        dept: u32,
        column: &'static str,
        value: String,
        known: Vec<String>,
    },

    /// Fitting was attempted on a batch with no usable rows
    #[error("cannot fit: batch contains no usable rows")]
    EmptyFit,

    /// A supervised matrix was requested from rows without targets
    #[error("{count} row(s) have no Weekly_Sales target")]
    MissingTarget { count: usize },
}

/// Problems loading or writing persisted artifacts.
/// Missing and corrupt are deliberately distinct: the first
/// means "train something", the second means "investigate".
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact at '{path}'")]
    NotFound { path: String },

    #[error("artifact '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    /// Concurrent writers of one version tag: the second fails,
    /// last-writer-wins is not acceptable for model artifacts
    #[error("version v{version} already exists at '{path}'")]
    VersionExists { version: u32, path: String },

    /// The loaded preprocessor/model pair does not belong together
    #[error("artifact pair broken: {reason}")]
    PairMismatch { reason: String },

    /// A fitted preprocessor built against a different column layout
    #[error("fitted schema {found:?} does not match this binary's schema")]
    SchemaMismatch { found: Vec<String> },

    #[error("artifact io at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Faults during hyperparameter search. Not gate rejections.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// The supplied grid names a parameter the estimator does not have
    #[error("unknown hyperparameter '{name}' (accepted: {accepted:?})")]
    UnknownParameter {
        name: String,
        accepted: &'static [&'static str],
    },

    /// A grid entry with an empty candidate list would silently
    /// produce zero cells
    #[error("hyperparameter '{name}' has an empty candidate list")]
    EmptyCandidates { name: String },

    #[error("{rows} training rows is not enough for {folds}-fold cross-validation")]
    InsufficientData { rows: usize, folds: usize },

    /// Cooperative abort between grid cells; nothing was persisted
    #[error("search cancelled after {completed} of {total} grid cells")]
    Cancelled { completed: usize, total: usize },

    #[error("invalid hyperparameter value: {name}={value}")]
    InvalidValue { name: String, value: f64 },
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
// Message formats are part of the operator-facing contract;
// keep them locked down.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let e = IngestionError::MissingColumn {
            path: "data/raw/features.csv".to_string(),
            column: "IsHoliday",
        };
        assert_eq!(
            e.to_string(),
            "'data/raw/features.csv' is missing required column 'IsHoliday'"
        );
    }

    #[test]
    fn test_unseen_category_names_the_offending_value() {
        let e = TransformationError::UnseenCategory {
            store: 4,
            dept: 12,
            column: "Type",
            value: "D".to_string(),
            known: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        };
        let msg = e.to_string();
        assert!(msg.contains("unseen Type level 'D'"));
        assert!(msg.contains("store 4 dept 12"));
    }

    #[test]
    fn test_missing_and_corrupt_are_distinct() {
        let missing = ArtifactError::NotFound { path: "artifacts/v3".to_string() };
        let corrupt = ArtifactError::Corrupt {
            path: "artifacts/v3/model.json".to_string(),
            reason: "checksum mismatch".to_string(),
        };
        assert!(missing.to_string().starts_with("no artifact"));
        assert!(corrupt.to_string().contains("corrupt"));
    }

    #[test]
    fn test_cancelled_reports_progress() {
        let e = TrainingError::Cancelled { completed: 3, total: 8 };
        assert_eq!(e.to_string(), "search cancelled after 3 of 8 grid cells");
    }
}
