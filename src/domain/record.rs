// ============================================================
// Layer 3 — Raw Record Domain Type
// ============================================================
// Represents one merged row of the forecasting dataset, keyed
// by (store, department, week). This is the shape every
// component downstream of the assembler works with: the
// transformer consumes it, the serving path receives one per
// prediction request.
//
// Most fields are Option because the source tables are joined
// with left-join semantics: a sales row must survive even when
// its features or store row is absent. Which gaps are fillable
// (fitted statistics exist) and which are fatal for the record
// is decided by the transformer, not here.
//
// Reference: Rust Book §5 (Structs and Methods)
//            Rust Book §6 (Option<T>)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the merged (sales + features + stores) table,
/// or one incoming prediction request.
///
/// `weekly_sales` is `Some` for historical rows only; future
/// rows and serving requests carry no target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Store number, part of the row key
    pub store: u32,

    /// Department number, part of the row key
    pub dept: u32,

    /// Week-ending date, part of the row key
    pub date: NaiveDate,

    /// Whether this week contains a major holiday
    pub is_holiday: Option<bool>,

    /// Regional temperature that week (may be missing)
    pub temperature: Option<f64>,

    /// Regional fuel price that week (may be missing)
    pub fuel_price: Option<f64>,

    /// Consumer price index (may be missing)
    pub cpi: Option<f64>,

    /// Regional unemployment rate (may be missing)
    pub unemployment: Option<f64>,

    /// Promotional markdown amounts 1..5.
    /// Frequently missing: promotions are not always active.
    pub markdowns: [Option<f64>; 5],

    /// Store class ("A", "B", "C")
    pub store_type: Option<String>,

    /// Store size in square feet
    pub size: Option<f64>,

    /// The target. Present on historical rows only.
    pub weekly_sales: Option<f64>,
}

impl RawRecord {
    /// Create a record with only its key populated.
    /// Callers fill the remaining fields directly; everything
    /// except the key starts out missing.
    pub fn new(store: u32, dept: u32, date: NaiveDate) -> Self {
        Self {
            store,
            dept,
            date,
            is_holiday:   None,
            temperature:  None,
            fuel_price:   None,
            cpi:          None,
            unemployment: None,
            markdowns:    [None; 5],
            store_type:   None,
            size:         None,
            weekly_sales: None,
        }
    }

    /// True when the row carries a training target.
    pub fn is_historical(&self) -> bool {
        self.weekly_sales.is_some()
    }
}
