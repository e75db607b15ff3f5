// ============================================================
// Layer 4 — Source Table Loader
// ============================================================
// Loads the three raw CSV tables using the csv crate with
// serde row deserialisation:
//
//   sales.csv    → SalesRow    (Store, Dept, Date, Weekly_Sales, IsHoliday)
//   features.csv → FeaturesRow (Store, Date, signals, markdowns, IsHoliday)
//   stores.csv   → StoresRow   (Store, Type, Size)
//
// The raw files use "NA" (or an empty cell) for missing values
// and "TRUE"/"FALSE" for the holiday flag, so the three custom
// deserialisers below normalise those before serde sees them.
//
// Unlike document ingestion, a malformed row here is fatal:
// training on a silently truncated sales table would skew every
// statistic the transformer fits, so errors carry the file and
// 1-based line number and abort the load.
//
// Reference: csv crate tutorial (serde deserialisation)
//            Rust Book §9 (Error Handling)

use std::fs::File;
use std::marker::PhantomData;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::domain::error::IngestionError;
use crate::domain::traits::TableSource;

// ─── Row Types ────────────────────────────────────────────────────────────────

/// One historical sales observation.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesRow {
    #[serde(rename = "Store")]
    pub store: u32,

    #[serde(rename = "Dept")]
    pub dept: u32,

    #[serde(rename = "Date", deserialize_with = "de_date")]
    pub date: NaiveDate,

    #[serde(rename = "Weekly_Sales")]
    pub weekly_sales: f64,

    #[serde(rename = "IsHoliday", deserialize_with = "de_flag")]
    pub is_holiday: bool,
}

/// One week of external signals for a store.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesRow {
    #[serde(rename = "Store")]
    pub store: u32,

    #[serde(rename = "Date", deserialize_with = "de_date")]
    pub date: NaiveDate,

    #[serde(rename = "Temperature", deserialize_with = "de_na_f64")]
    pub temperature: Option<f64>,

    #[serde(rename = "Fuel_Price", deserialize_with = "de_na_f64")]
    pub fuel_price: Option<f64>,

    #[serde(rename = "MarkDown1", deserialize_with = "de_na_f64")]
    pub markdown1: Option<f64>,

    #[serde(rename = "MarkDown2", deserialize_with = "de_na_f64")]
    pub markdown2: Option<f64>,

    #[serde(rename = "MarkDown3", deserialize_with = "de_na_f64")]
    pub markdown3: Option<f64>,

    #[serde(rename = "MarkDown4", deserialize_with = "de_na_f64")]
    pub markdown4: Option<f64>,

    #[serde(rename = "MarkDown5", deserialize_with = "de_na_f64")]
    pub markdown5: Option<f64>,

    #[serde(rename = "CPI", deserialize_with = "de_na_f64")]
    pub cpi: Option<f64>,

    #[serde(rename = "Unemployment", deserialize_with = "de_na_f64")]
    pub unemployment: Option<f64>,

    #[serde(rename = "IsHoliday", deserialize_with = "de_flag")]
    pub is_holiday: bool,
}

impl FeaturesRow {
    /// The five markdown columns as one array, in column order.
    pub fn markdowns(&self) -> [Option<f64>; 5] {
        [
            self.markdown1,
            self.markdown2,
            self.markdown3,
            self.markdown4,
            self.markdown5,
        ]
    }
}

/// One store's fixed attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresRow {
    #[serde(rename = "Store")]
    pub store: u32,

    #[serde(rename = "Type")]
    pub store_type: String,

    #[serde(rename = "Size")]
    pub size: f64,
}

/// Header columns a row type cannot be built without.
/// Checked up front so a missing join key fails with the column
/// name instead of a per-row serde message.
pub trait CsvRow: DeserializeOwned {
    const REQUIRED_COLUMNS: &'static [&'static str];
}

impl CsvRow for SalesRow {
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["Store", "Dept", "Date", "Weekly_Sales", "IsHoliday"];
}

impl CsvRow for FeaturesRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "Store",
        "Date",
        "Temperature",
        "Fuel_Price",
        "MarkDown1",
        "MarkDown2",
        "MarkDown3",
        "MarkDown4",
        "MarkDown5",
        "CPI",
        "Unemployment",
        "IsHoliday",
    ];
}

impl CsvRow for StoresRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["Store", "Type", "Size"];
}

// ─── CsvTable ─────────────────────────────────────────────────────────────────

/// Loads one typed CSV table from disk.
/// Implements the TableSource trait from Layer 3.
pub struct CsvTable<R> {
    /// Path to the CSV file
    path: String,
    _row: PhantomData<R>,
}

impl<R> CsvTable<R> {
    /// Create a loader pointed at a CSV file
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            _row: PhantomData,
        }
    }
}

impl<R: CsvRow> TableSource for CsvTable<R> {
    type Row = R;

    fn load(&self) -> Result<Vec<R>, IngestionError> {
        let file = File::open(&self.path).map_err(|source| IngestionError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut reader = csv::Reader::from_reader(file);

        // Validate the header before touching any row, so a renamed
        // join-key column is reported as exactly that.
        let headers = reader.headers().map_err(|e| IngestionError::Row {
            path: self.path.clone(),
            line: 1,
            message: e.to_string(),
        })?;
        for required in R::REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *required) {
                return Err(IngestionError::MissingColumn {
                    path: self.path.clone(),
                    column: required,
                });
            }
        }

        let mut rows = Vec::new();
        for (i, row) in reader.deserialize::<R>().enumerate() {
            // Line 1 is the header, so data row i sits on line i + 2
            let row = row.map_err(|e| IngestionError::Row {
                path: self.path.clone(),
                line: i + 2,
                message: e.to_string(),
            })?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IngestionError::Empty {
                path: self.path.clone(),
            });
        }

        tracing::debug!("Loaded {} rows from '{}'", rows.len(), self.path);
        Ok(rows)
    }
}

// ─── Deserialisation helpers ──────────────────────────────────────────────────

/// "NA" and empty cells are missing values, everything else must parse.
fn de_na_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("NA") => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid number '{s}'"))),
    }
}

/// The raw files write booleans as TRUE/FALSE (any casing).
fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag '{other}'"))),
    }
}

/// Week-ending dates are written as YYYY-MM-DD.
fn de_date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        serde::de::Error::custom(format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{content}").unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_loads_sales_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "sales.csv",
            "Store,Dept,Date,Weekly_Sales,IsHoliday\n\
             1,1,2012-11-02,24924.50,FALSE\n\
             1,2,2012-11-09,11737.12,TRUE\n",
        );

        let rows = CsvTable::<SalesRow>::new(&path).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].store, 1);
        assert_eq!(rows[0].weekly_sales, 24924.50);
        assert!(!rows[0].is_holiday);
        assert!(rows[1].is_holiday);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2012, 11, 9).unwrap());
    }

    #[test]
    fn test_na_cells_become_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "features.csv",
            "Store,Date,Temperature,Fuel_Price,MarkDown1,MarkDown2,MarkDown3,MarkDown4,MarkDown5,CPI,Unemployment,IsHoliday\n\
             1,2012-11-02,55.3,3.45,NA,,NA,NA,6500.2,126.1,8.1,FALSE\n",
        );

        let rows = CsvTable::<FeaturesRow>::new(&path).load().unwrap();
        assert_eq!(rows[0].temperature, Some(55.3));
        assert_eq!(rows[0].markdown1, None);
        assert_eq!(rows[0].markdown2, None);
        assert_eq!(rows[0].markdown5, Some(6500.2));
        assert_eq!(
            rows[0].markdowns(),
            [None, None, None, None, Some(6500.2)]
        );
    }

    #[test]
    fn test_missing_join_key_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        // No IsHoliday column at all
        let path = write_csv(
            &dir,
            "sales.csv",
            "Store,Dept,Date,Weekly_Sales\n1,1,2012-11-02,100.0\n",
        );

        let err = CsvTable::<SalesRow>::new(&path).load().unwrap_err();
        match err {
            IngestionError::MissingColumn { column, .. } => assert_eq!(column, "IsHoliday"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_row_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "stores.csv",
            "Store,Type,Size\n1,A,151315\n2,B,not-a-number\n",
        );

        let err = CsvTable::<StoresRow>::new(&path).load().unwrap_err();
        match err {
            IngestionError::Row { line, .. } => assert_eq!(line, 3),
            other => panic!("expected Row, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "stores.csv", "Store,Type,Size\n");

        let err = CsvTable::<StoresRow>::new(&path).load().unwrap_err();
        assert!(matches!(err, IngestionError::Empty { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvTable::<StoresRow>::new("does/not/exist.csv")
            .load()
            .unwrap_err();
        assert!(matches!(err, IngestionError::Io { .. }));
    }
}
