//! CSV dataset loader.
//!
//! Reads the transaction, inventory and (optional) dark-store files of a data
//! directory. Malformed rows are skipped and counted by reason; they never
//! abort a load.
//!
//! Expected files:
//!   transactions.csv  timestamp, dark_store_id, category, quantity_ordered,
//!                     quantity_fulfilled, delivery_time_minutes, csat_score,
//!                     [customer_lat, customer_lon]
//!   inventory.csv     dark_store_id, product_name, category, current_stock,
//!                     [lead_time_hours, storage_cost_per_unit, supplier_reliability]
//!   dark_stores.csv   store_id, [name], lat, lon, [coverage_radius_km]

use crate::config::AnalysisConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::{
    DarkStore, DarkStoreCsvRecord, InventoryItem, RowIssue, Transaction, TransactionCsvRecord,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const INVENTORY_FILE: &str = "inventory.csv";
pub const DARK_STORES_FILE: &str = "dark_stores.csv";

/// Logged individually before switching to counting only
const LOGGED_ROW_ERRORS: usize = 5;

/// Per-file summary of skipped rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadWarnings {
    pub file: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub reasons: BTreeMap<String, usize>,
}

impl LoadWarnings {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Self::default()
        }
    }

    fn skip(&mut self, line: usize, issue: RowIssue, detail: &str) {
        if self.rows_skipped < LOGGED_ROW_ERRORS {
            warn!("{}: skipping line {} ({}){}", self.file, line, issue, detail);
        }
        self.count(issue, 1);
    }

    fn count(&mut self, issue: RowIssue, rows: usize) {
        self.rows_skipped += rows;
        *self.reasons.entry(issue.as_str().to_string()).or_insert(0) += rows;
    }

    pub fn rows_loaded(&self) -> usize {
        self.rows_read - self.rows_skipped
    }
}

/// Everything one analysis run reads
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub transactions: Vec<Transaction>,
    pub inventory: Vec<InventoryItem>,
    pub stores: Vec<DarkStore>,
    pub warnings: Vec<LoadWarnings>,
}

impl Dataset {
    /// Load a data directory. Stores come from `dark_stores.csv` when present,
    /// otherwise from the configuration.
    pub fn load_dir<P: AsRef<Path>>(dir: P, config: &AnalysisConfig) -> Result<Self> {
        let dir = dir.as_ref();

        let (mut transactions, mut tx_warnings) = load_transactions(open(&dir.join(TRANSACTIONS_FILE))?)?;
        drop_stray_dates(&mut transactions, &mut tx_warnings, config.max_span_days);
        info!(
            "Loaded {} transactions ({} skipped)",
            transactions.len(),
            tx_warnings.rows_skipped
        );
        let mut warnings = vec![tx_warnings];

        let inventory_path = dir.join(INVENTORY_FILE);
        let inventory = if inventory_path.exists() {
            let (items, inv_warnings) = load_inventory(open(&inventory_path)?)?;
            info!("Loaded {} inventory rows ({} skipped)", items.len(), inv_warnings.rows_skipped);
            warnings.push(inv_warnings);
            items
        } else {
            warn!("No {} in {}; inventory policies will use defaults", INVENTORY_FILE, dir.display());
            Vec::new()
        };

        let stores_path = dir.join(DARK_STORES_FILE);
        let stores = if stores_path.exists() {
            let (stores, store_warnings) =
                load_dark_stores(open(&stores_path)?, config.default_coverage_radius_km)?;
            info!("Loaded {} dark stores", stores.len());
            warnings.push(store_warnings);
            stores
        } else {
            config.stores.clone()
        };

        Ok(Self {
            transactions,
            inventory,
            stores,
            warnings,
        })
    }

    pub fn total_skipped(&self) -> usize {
        self.warnings.iter().map(|w| w.rows_skipped).sum()
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| AnalyticsError::DataFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Deserialize every row, handing good rows to `convert` and counting bad ones
fn load_rows<R, Raw, T, F>(reader: R, file: &str, mut convert: F) -> Result<(Vec<T>, LoadWarnings)>
where
    R: Read,
    Raw: DeserializeOwned,
    F: FnMut(Raw) -> std::result::Result<T, RowIssue>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // A file without a readable header is an input error, not a bad row
    csv_reader.headers()?;

    let mut warnings = LoadWarnings::new(file);
    let mut rows = Vec::new();

    for (i, result) in csv_reader.deserialize::<Raw>().enumerate() {
        let line = i + 2;
        warnings.rows_read += 1;
        match result {
            Ok(raw) => match convert(raw) {
                Ok(row) => rows.push(row),
                Err(issue) => warnings.skip(line, issue, ""),
            },
            Err(e) => warnings.skip(line, RowIssue::Unparseable, &format!(": {}", e)),
        }
    }

    if warnings.rows_skipped > LOGGED_ROW_ERRORS {
        warn!(
            "{}: {} more malformed rows not shown",
            file,
            warnings.rows_skipped - LOGGED_ROW_ERRORS
        );
    }

    Ok((rows, warnings))
}

/// Drop transactions dated more than `max_days` from the median date, so one
/// stray timestamp cannot stretch the observed calendar span
fn drop_stray_dates(transactions: &mut Vec<Transaction>, warnings: &mut LoadWarnings, max_days: i64) {
    let mut dates: Vec<NaiveDate> = transactions.iter().map(|t| t.date()).collect();
    if dates.is_empty() {
        return;
    }
    dates.sort_unstable();
    let median = dates[dates.len() / 2];

    let before = transactions.len();
    transactions.retain(|t| (t.date() - median).num_days().abs() <= max_days);
    let dropped = before - transactions.len();
    if dropped > 0 {
        warn!(
            "{}: {} rows dated more than {} days from {}",
            warnings.file, dropped, max_days, median
        );
        warnings.count(RowIssue::DateOutOfWindow, dropped);
    }
}

pub fn load_transactions<R: Read>(reader: R) -> Result<(Vec<Transaction>, LoadWarnings)> {
    load_rows(reader, TRANSACTIONS_FILE, |raw: TransactionCsvRecord| raw.to_transaction())
}

pub fn load_inventory<R: Read>(reader: R) -> Result<(Vec<InventoryItem>, LoadWarnings)> {
    load_rows(reader, INVENTORY_FILE, |item: InventoryItem| {
        item.check()?;
        Ok(item)
    })
}

pub fn load_dark_stores<R: Read>(
    reader: R,
    default_radius_km: f64,
) -> Result<(Vec<DarkStore>, LoadWarnings)> {
    load_rows(reader, DARK_STORES_FILE, |raw: DarkStoreCsvRecord| {
        raw.to_dark_store(default_radius_km)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TRANSACTIONS: &str = "\
timestamp,dark_store_id,category,quantity_ordered,quantity_fulfilled,delivery_time_minutes,csat_score,customer_lat,customer_lon
2024-03-04 08:10:00,DS001,Dairy,4,4,11.0,4.5,12.975,77.600
2024-03-04 08:40:00,DS001,Dairy,3,2,14.5,3.9,,
2024-03-04 09:05:00,DS002,Snacks,-1,0,10.0,4.0,,
2024-03-04 09:15:00,DS002,Snacks,2,5,10.0,4.0,,
not-a-date,DS002,Snacks,2,2,10.0,4.0,,
2024-03-04 09:30:00,DS002,Snacks,two,2,10.0,4.0,,
";

    #[test]
    fn skips_and_counts_malformed_rows() {
        let (txs, warnings) = load_transactions(SAMPLE_TRANSACTIONS.as_bytes()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(warnings.rows_read, 6);
        assert_eq!(warnings.rows_skipped, 4);
        assert_eq!(warnings.rows_loaded(), 2);
        assert_eq!(warnings.reasons.get("negative_quantity"), Some(&1));
        assert_eq!(warnings.reasons.get("fulfilled_exceeds_ordered"), Some(&1));
        assert_eq!(warnings.reasons.get("bad_timestamp"), Some(&1));
        assert_eq!(warnings.reasons.get("unparseable"), Some(&1));
        assert!(txs[0].customer_location.is_some());
        assert!(txs[1].customer_location.is_none());
    }

    #[test]
    fn location_columns_are_optional() {
        let csv = "\
timestamp,dark_store_id,category,quantity_ordered,quantity_fulfilled,delivery_time_minutes,csat_score
2024-03-04 08:10:00,DS001,Dairy,4,4,11.0,4.5
";
        let (txs, warnings) = load_transactions(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(warnings.rows_skipped, 0);
        assert!(txs[0].customer_location.is_none());
    }

    #[test]
    fn loads_inventory_with_optional_columns() {
        let csv = "\
dark_store_id,product_name,category,current_stock,lead_time_hours,storage_cost_per_unit,supplier_reliability
DS001,Milk 1L,Dairy,40,12,2.5,0.95
DS001,Chips,Snacks,25,,,
DS002,Bread,Staples,-3,24,1.0,0.9
";
        let (items, warnings) = load_inventory(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].lead_time_hours, Some(12.0));
        assert_eq!(items[1].storage_cost_per_unit, None);
        assert_eq!(warnings.reasons.get("negative_stock"), Some(&1));
    }

    #[test]
    fn stray_dates_are_dropped_and_counted() {
        let csv = "\
timestamp,dark_store_id,category,quantity_ordered,quantity_fulfilled,delivery_time_minutes,csat_score
2024-03-04 08:10:00,DS001,Dairy,4,4,11.0,4.5
2024-03-05 08:10:00,DS001,Dairy,4,4,11.0,4.5
1900-01-01 08:10:00,DS001,Dairy,4,4,11.0,4.5
2024-03-06 08:10:00,DS001,Dairy,4,4,11.0,4.5
2099-12-31 08:10:00,DS001,Dairy,4,4,11.0,4.5
";
        let (mut txs, mut warnings) = load_transactions(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 5);
        drop_stray_dates(&mut txs, &mut warnings, 366);
        assert_eq!(txs.len(), 3);
        assert_eq!(warnings.rows_skipped, 2);
        assert_eq!(warnings.rows_loaded(), 3);
        assert_eq!(warnings.reasons.get("date_out_of_window"), Some(&2));
        assert_eq!(crate::demand::ObservationSpan::of(&txs).days, 3);
    }

    #[test]
    fn infinite_inventory_figures_are_malformed() {
        let csv = "\
dark_store_id,product_name,category,current_stock,lead_time_hours,storage_cost_per_unit,supplier_reliability
DS001,Milk,Dairy,0,inf,inf,0.9
DS001,Curd,Dairy,4,12,inf,0.9
DS001,Paneer,Dairy,4,12,3.0,NaN
DS001,Butter,Dairy,4,12,3.0,0.9
";
        let (items, warnings) = load_inventory(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Butter");
        assert_eq!(warnings.rows_skipped, 3);
        assert_eq!(warnings.reasons.get("invalid_lead_time"), Some(&1));
        assert_eq!(warnings.reasons.get("invalid_unit_cost"), Some(&1));
        assert_eq!(warnings.reasons.get("invalid_supplier_reliability"), Some(&1));
    }

    #[test]
    fn dark_store_names_fall_back_to_directory() {
        let csv = "\
store_id,name,lat,lon,coverage_radius_km
DS002,,12.9698,77.75,
DS900,Indiranagar,12.9784,77.6408,4.0
";
        let (stores, _) = load_dark_stores(csv.as_bytes(), 3.0).unwrap();
        assert_eq!(stores[0].name, "Whitefield");
        assert_eq!(stores[0].coverage_radius_km, 3.0);
        assert_eq!(stores[1].name, "Indiranagar");
        assert_eq!(stores[1].coverage_radius_km, 4.0);
    }

    #[test]
    fn missing_transactions_file_is_an_error() {
        let dir = std::env::temp_dir().join("dsa-loader-missing-dir-does-not-exist");
        let err = Dataset::load_dir(&dir, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::DataFile { .. }));
    }
}
