// ============================================================
// Layer 3 — Feature Column Schema
// ============================================================
// ONE ordered description of the feature space, shared by the
// assembler, the transformer, and the serving path.
//
// The estimator is positional: it never sees column names,
// only a numeric matrix. If training emits columns in one
// order and serving in another, the model still runs and
// silently mispredicts. Every component therefore derives its
// column handling from this enum instead of keeping its own
// name list.
//
// The variants are declared in canonical output order, so
// `column as usize` IS the column index.
//
// Reference: Rust Book §6 (Enums), §10 (Derive Macros)

use serde::{Deserialize, Serialize};

/// One column of the canonical feature matrix, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureColumn {
    Month,
    Year,
    WeekOfYear,
    Temperature,
    FuelPrice,
    Cpi,
    Unemployment,
    StoreType,
    IsHoliday,
    MarkDown1,
    MarkDown2,
    MarkDown3,
    MarkDown4,
    MarkDown5,
    Store,
    Dept,
    Size,
}

impl FeatureColumn {
    /// Width of the feature matrix.
    pub const COUNT: usize = 17;

    /// Every column in canonical order. The estimator is fit against
    /// matrices laid out exactly like this.
    pub const ALL: [FeatureColumn; Self::COUNT] = [
        FeatureColumn::Month,
        FeatureColumn::Year,
        FeatureColumn::WeekOfYear,
        FeatureColumn::Temperature,
        FeatureColumn::FuelPrice,
        FeatureColumn::Cpi,
        FeatureColumn::Unemployment,
        FeatureColumn::StoreType,
        FeatureColumn::IsHoliday,
        FeatureColumn::MarkDown1,
        FeatureColumn::MarkDown2,
        FeatureColumn::MarkDown3,
        FeatureColumn::MarkDown4,
        FeatureColumn::MarkDown5,
        FeatureColumn::Store,
        FeatureColumn::Dept,
        FeatureColumn::Size,
    ];

    /// The four external signals imputed with a fitted mean.
    pub const MEAN_IMPUTED: [FeatureColumn; 4] = [
        FeatureColumn::Temperature,
        FeatureColumn::FuelPrice,
        FeatureColumn::Cpi,
        FeatureColumn::Unemployment,
    ];

    /// The five promotion columns filled by interpolation.
    pub const MARKDOWNS: [FeatureColumn; 5] = [
        FeatureColumn::MarkDown1,
        FeatureColumn::MarkDown2,
        FeatureColumn::MarkDown3,
        FeatureColumn::MarkDown4,
        FeatureColumn::MarkDown5,
    ];

    /// Position of this column in the canonical output.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The source-table column name (also used in artifacts and errors).
    pub const fn name(self) -> &'static str {
        match self {
            FeatureColumn::Month        => "Month",
            FeatureColumn::Year         => "Year",
            FeatureColumn::WeekOfYear   => "WeekOfYear",
            FeatureColumn::Temperature  => "Temperature",
            FeatureColumn::FuelPrice    => "Fuel_Price",
            FeatureColumn::Cpi          => "CPI",
            FeatureColumn::Unemployment => "Unemployment",
            FeatureColumn::StoreType    => "Type",
            FeatureColumn::IsHoliday    => "IsHoliday",
            FeatureColumn::MarkDown1    => "MarkDown1",
            FeatureColumn::MarkDown2    => "MarkDown2",
            FeatureColumn::MarkDown3    => "MarkDown3",
            FeatureColumn::MarkDown4    => "MarkDown4",
            FeatureColumn::MarkDown5    => "MarkDown5",
            FeatureColumn::Store        => "Store",
            FeatureColumn::Dept         => "Dept",
            FeatureColumn::Size         => "Size",
        }
    }

    /// Canonical column names in order, as stored in the fitted
    /// preprocessor artifact so a loaded state can be checked against
    /// the schema this binary was compiled with.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|c| c.name().to_string()).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_position_in_all() {
        for (i, col) in FeatureColumn::ALL.iter().enumerate() {
            assert_eq!(col.index(), i, "column {} out of order", col.name());
        }
    }

    #[test]
    fn test_canonical_order_is_stable() {
        // Serving artifacts depend on this exact order. If this test
        // fails, previously fitted preprocessors are no longer valid.
        let names = FeatureColumn::names();
        assert_eq!(
            names,
            vec![
                "Month", "Year", "WeekOfYear",
                "Temperature", "Fuel_Price", "CPI", "Unemployment",
                "Type", "IsHoliday",
                "MarkDown1", "MarkDown2", "MarkDown3", "MarkDown4", "MarkDown5",
                "Store", "Dept", "Size",
            ]
        );
        assert_eq!(names.len(), FeatureColumn::COUNT);
    }

    #[test]
    fn test_subsets_are_within_canonical_set() {
        for col in FeatureColumn::MEAN_IMPUTED.iter().chain(FeatureColumn::MARKDOWNS.iter()) {
            assert!(FeatureColumn::ALL.contains(col));
        }
    }
}
