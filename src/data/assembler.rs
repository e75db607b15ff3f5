// ============================================================
// Layer 4 — Raw Dataset Assembler
// ============================================================
// Joins the three source tables into one row-per-(store, dept,
// week) table, plus a parallel "future" table of weeks that
// have signals but no sales yet.
//
// Join shape (left joins, sales rows always survive):
//
//   sales ⟕ features  on (Store, Date, IsHoliday)
//         ⟕ stores    on (Store)
//
// A sales row whose features or store attributes are absent is
// kept with those fields missing; the transformer decides later
// what is fillable. Dropping the row here would silently bias
// every fitted statistic.
//
// The future table: every features row dated after the last
// historical sales date, expanded across the departments each
// store has historically reported, with store attributes joined
// on. No target — these rows exist for serving-time simulation.
//
// Reference: Rust Book §8 (HashMaps)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::data::loader::{FeaturesRow, SalesRow, StoresRow};
use crate::domain::record::RawRecord;

/// The assembler's output: historical rows carry targets,
/// future rows never do.
#[derive(Debug)]
pub struct AssembledFrames {
    pub historical: Vec<RawRecord>,
    pub future:     Vec<RawRecord>,
}

/// Join the three source tables. Both output tables come back
/// sorted by (store, dept, date) so everything downstream,
/// interpolation order included, is deterministic.
pub fn assemble(
    sales:    &[SalesRow],
    features: &[FeaturesRow],
    stores:   &[StoresRow],
) -> AssembledFrames {
    let features_by_key: HashMap<(u32, NaiveDate, bool), &FeaturesRow> = features
        .iter()
        .map(|f| ((f.store, f.date, f.is_holiday), f))
        .collect();

    let stores_by_id: HashMap<u32, &StoresRow> =
        stores.iter().map(|s| (s.store, s)).collect();

    // ── Historical table ──────────────────────────────────────────────────────
    let mut historical = Vec::with_capacity(sales.len());
    let mut unmatched_features = 0usize;
    let mut unmatched_stores   = 0usize;

    for sale in sales {
        let mut record = RawRecord::new(sale.store, sale.dept, sale.date);
        record.is_holiday   = Some(sale.is_holiday);
        record.weekly_sales = Some(sale.weekly_sales);

        match features_by_key.get(&(sale.store, sale.date, sale.is_holiday)) {
            Some(f) => {
                record.temperature  = f.temperature;
                record.fuel_price   = f.fuel_price;
                record.cpi          = f.cpi;
                record.unemployment = f.unemployment;
                record.markdowns    = f.markdowns();
            }
            None => unmatched_features += 1,
        }

        match stores_by_id.get(&sale.store) {
            Some(s) => {
                record.store_type = Some(s.store_type.clone());
                record.size       = Some(s.size);
            }
            None => unmatched_stores += 1,
        }

        historical.push(record);
    }

    historical.sort_by_key(|r| (r.store, r.dept, r.date));

    if unmatched_features > 0 {
        tracing::warn!(
            "{} sales rows had no matching features row (kept with missing signals)",
            unmatched_features
        );
    }
    if unmatched_stores > 0 {
        tracing::warn!(
            "{} sales rows had no matching store attributes",
            unmatched_stores
        );
    }

    // ── Future table ──────────────────────────────────────────────────────────
    // Departments are taken from the sales history: a store only
    // forecasts departments it has actually reported.
    let last_sales_date = sales.iter().map(|s| s.date).max();

    let mut depts_by_store: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
    for sale in sales {
        depts_by_store.entry(sale.store).or_default().insert(sale.dept);
    }

    let mut future = Vec::new();
    if let Some(cutoff) = last_sales_date {
        for f in features {
            if f.date <= cutoff {
                continue;
            }
            let Some(depts) = depts_by_store.get(&f.store) else {
                continue;
            };
            for &dept in depts {
                let mut record = RawRecord::new(f.store, dept, f.date);
                record.is_holiday   = Some(f.is_holiday);
                record.temperature  = f.temperature;
                record.fuel_price   = f.fuel_price;
                record.cpi          = f.cpi;
                record.unemployment = f.unemployment;
                record.markdowns    = f.markdowns();
                if let Some(s) = stores_by_id.get(&f.store) {
                    record.store_type = Some(s.store_type.clone());
                    record.size       = Some(s.size);
                }
                future.push(record);
            }
        }
    }

    future.sort_by_key(|r| (r.store, r.dept, r.date));

    tracing::info!(
        "Assembled {} historical rows and {} future rows (cutoff: {})",
        historical.len(),
        future.len(),
        last_sales_date.map(|d| d.to_string()).unwrap_or_else(|| "n/a".to_string()),
    );

    AssembledFrames { historical, future }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sale(store: u32, dept: u32, d: &str, sales: f64, holiday: bool) -> SalesRow {
        SalesRow {
            store,
            dept,
            date: date(d),
            weekly_sales: sales,
            is_holiday: holiday,
        }
    }

    fn feat(store: u32, d: &str, holiday: bool, temp: f64) -> FeaturesRow {
        FeaturesRow {
            store,
            date: date(d),
            temperature: Some(temp),
            fuel_price: Some(3.5),
            markdown1: None,
            markdown2: None,
            markdown3: Some(100.0),
            markdown4: None,
            markdown5: None,
            cpi: Some(126.0),
            unemployment: Some(8.0),
            is_holiday: holiday,
        }
    }

    fn store_row(store: u32, t: &str, size: f64) -> StoresRow {
        StoresRow {
            store,
            store_type: t.to_string(),
            size,
        }
    }

    #[test]
    fn test_joins_all_three_tables() {
        let frames = assemble(
            &[sale(1, 1, "2012-10-26", 24924.5, false)],
            &[feat(1, "2012-10-26", false, 55.3)],
            &[store_row(1, "A", 151315.0)],
        );

        assert_eq!(frames.historical.len(), 1);
        let r = &frames.historical[0];
        assert_eq!(r.temperature, Some(55.3));
        assert_eq!(r.store_type.as_deref(), Some("A"));
        assert_eq!(r.size, Some(151315.0));
        assert_eq!(r.weekly_sales, Some(24924.5));
        assert_eq!(r.markdowns[2], Some(100.0));
    }

    #[test]
    fn test_left_join_keeps_sales_without_features() {
        // Holiday flag disagrees, so the join misses — the sales row
        // must survive with missing signals, not be dropped.
        let frames = assemble(
            &[sale(1, 1, "2012-10-26", 100.0, true)],
            &[feat(1, "2012-10-26", false, 55.3)],
            &[store_row(1, "A", 151315.0)],
        );

        assert_eq!(frames.historical.len(), 1);
        let r = &frames.historical[0];
        assert_eq!(r.temperature, None);
        assert_eq!(r.size, Some(151315.0));
    }

    #[test]
    fn test_future_rows_start_after_last_sales_date() {
        let frames = assemble(
            &[
                sale(1, 1, "2012-10-19", 90.0, false),
                sale(1, 2, "2012-10-26", 95.0, false),
            ],
            &[
                feat(1, "2012-10-26", false, 50.0),
                feat(1, "2012-11-02", false, 48.0),
                feat(1, "2012-11-09", true, 47.0),
            ],
            &[store_row(1, "B", 39690.0)],
        );

        // Two future weeks × two historical departments
        assert_eq!(frames.future.len(), 4);
        assert!(frames.future.iter().all(|r| r.date > date("2012-10-26")));
        assert!(frames.future.iter().all(|r| r.weekly_sales.is_none()));
        assert!(frames.future.iter().all(|r| r.size == Some(39690.0)));

        let depts: BTreeSet<u32> = frames.future.iter().map(|r| r.dept).collect();
        assert_eq!(depts, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_output_is_sorted_by_store_dept_date() {
        let frames = assemble(
            &[
                sale(2, 1, "2012-10-26", 1.0, false),
                sale(1, 2, "2012-10-26", 2.0, false),
                sale(1, 1, "2012-10-19", 3.0, false),
                sale(1, 1, "2012-10-26", 4.0, false),
            ],
            &[],
            &[],
        );

        let keys: Vec<(u32, u32, NaiveDate)> = frames
            .historical
            .iter()
            .map(|r| (r.store, r.dept, r.date))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
