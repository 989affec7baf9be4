use chrono::{NaiveDate, NaiveDateTime, Timelike};
use geo::Point;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw record from the transactions CSV
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionCsvRecord {
    pub timestamp: String,
    pub dark_store_id: String,
    pub category: String,
    pub quantity_ordered: i64,
    pub quantity_fulfilled: i64,
    pub delivery_time_minutes: f64,
    pub csat_score: f64,
    pub customer_lat: Option<f64>,
    pub customer_lon: Option<f64>,
}

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within the latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// As a `geo` point: x is longitude, y is latitude
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// One order line. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub timestamp: NaiveDateTime,
    pub store_id: String,
    pub category: String,
    pub quantity_ordered: u32,
    pub quantity_fulfilled: u32,
    pub delivery_time_minutes: f64,
    pub customer_satisfaction: f64,
    pub customer_location: Option<GeoPoint>,
}

impl Transaction {
    pub fn hour(&self) -> u8 {
        self.timestamp.hour() as u8
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Units ordered but not delivered
    pub fn shortfall(&self) -> u32 {
        self.quantity_ordered.saturating_sub(self.quantity_fulfilled)
    }
}

/// Why a row was rejected by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowIssue {
    Unparseable,
    BadTimestamp,
    MissingKey,
    NegativeQuantity,
    OverFulfilled,
    InvalidDeliveryTime,
    CsatOutOfRange,
    HalfLocation,
    NegativeStock,
    InvalidLeadTime,
    InvalidUnitCost,
    InvalidReliability,
    BadCoordinates,
    DateOutOfWindow,
}

impl RowIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowIssue::Unparseable => "unparseable",
            RowIssue::BadTimestamp => "bad_timestamp",
            RowIssue::MissingKey => "missing_key",
            RowIssue::NegativeQuantity => "negative_quantity",
            RowIssue::OverFulfilled => "fulfilled_exceeds_ordered",
            RowIssue::InvalidDeliveryTime => "invalid_delivery_time",
            RowIssue::CsatOutOfRange => "csat_out_of_range",
            RowIssue::HalfLocation => "incomplete_location",
            RowIssue::NegativeStock => "negative_stock",
            RowIssue::InvalidLeadTime => "invalid_lead_time",
            RowIssue::InvalidUnitCost => "invalid_unit_cost",
            RowIssue::InvalidReliability => "invalid_supplier_reliability",
            RowIssue::BadCoordinates => "bad_coordinates",
            RowIssue::DateOutOfWindow => "date_out_of_window",
        }
    }
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransactionCsvRecord {
    pub fn to_transaction(&self) -> Result<Transaction, RowIssue> {
        let timestamp = NaiveDateTime::parse_from_str(self.timestamp.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| RowIssue::BadTimestamp)?;

        if self.dark_store_id.trim().is_empty() || self.category.trim().is_empty() {
            return Err(RowIssue::MissingKey);
        }
        if self.quantity_ordered < 0 || self.quantity_fulfilled < 0 {
            return Err(RowIssue::NegativeQuantity);
        }
        if self.quantity_fulfilled > self.quantity_ordered {
            return Err(RowIssue::OverFulfilled);
        }
        if !self.delivery_time_minutes.is_finite() || self.delivery_time_minutes < 0.0 {
            return Err(RowIssue::InvalidDeliveryTime);
        }
        if !(0.0..=5.0).contains(&self.csat_score) {
            return Err(RowIssue::CsatOutOfRange);
        }

        let customer_location = match (self.customer_lat, self.customer_lon) {
            (Some(lat), Some(lon)) => {
                let point = GeoPoint::new(lat, lon);
                if !point.is_valid() {
                    return Err(RowIssue::BadCoordinates);
                }
                Some(point)
            }
            (None, None) => None,
            _ => return Err(RowIssue::HalfLocation),
        };

        Ok(Transaction {
            timestamp,
            store_id: self.dark_store_id.trim().to_string(),
            category: self.category.trim().to_string(),
            quantity_ordered: u32::try_from(self.quantity_ordered).map_err(|_| RowIssue::Unparseable)?,
            quantity_fulfilled: u32::try_from(self.quantity_fulfilled).map_err(|_| RowIssue::Unparseable)?,
            delivery_time_minutes: self.delivery_time_minutes,
            customer_satisfaction: self.csat_score,
            customer_location,
        })
    }
}

/// Stock position of one product at one dark store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "dark_store_id")]
    pub store_id: String,
    pub product_name: String,
    pub category: String,
    pub current_stock: f64,
    pub lead_time_hours: Option<f64>,
    pub storage_cost_per_unit: Option<f64>,
    pub supplier_reliability: Option<f64>,
}

impl InventoryItem {
    pub fn check(&self) -> Result<(), RowIssue> {
        if self.store_id.trim().is_empty() || self.category.trim().is_empty() {
            return Err(RowIssue::MissingKey);
        }
        if !self.current_stock.is_finite() || self.current_stock < 0.0 {
            return Err(RowIssue::NegativeStock);
        }
        if !finite_non_negative(self.lead_time_hours) {
            return Err(RowIssue::InvalidLeadTime);
        }
        if !finite_non_negative(self.storage_cost_per_unit) {
            return Err(RowIssue::InvalidUnitCost);
        }
        if self.supplier_reliability.is_some_and(|r| !(0.0..=1.0).contains(&r)) {
            return Err(RowIssue::InvalidReliability);
        }
        Ok(())
    }
}

/// Absent, or a finite value >= 0
fn finite_non_negative(value: Option<f64>) -> bool {
    value.map_or(true, |v| v.is_finite() && v >= 0.0)
}

/// Fulfillment-only dispatch point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkStore {
    pub store_id: String,
    pub name: String,
    pub location: GeoPoint,
    pub coverage_radius_km: f64,
}

/// Raw record from the optional dark-store CSV
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DarkStoreCsvRecord {
    pub store_id: String,
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub coverage_radius_km: Option<f64>,
}

impl DarkStoreCsvRecord {
    pub fn to_dark_store(&self, default_radius_km: f64) -> Result<DarkStore, RowIssue> {
        if self.store_id.trim().is_empty() {
            return Err(RowIssue::MissingKey);
        }
        if !GeoPoint::new(self.lat, self.lon).is_valid() {
            return Err(RowIssue::BadCoordinates);
        }
        let store_id = self.store_id.trim().to_string();
        Ok(DarkStore {
            name: self
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| crate::store_names::get_store_name(&store_id)),
            store_id,
            location: GeoPoint::new(self.lat, self.lon),
            coverage_radius_km: self.coverage_radius_km.unwrap_or(default_radius_km),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> TransactionCsvRecord {
        TransactionCsvRecord {
            timestamp: "2024-03-04 18:15:00".into(),
            dark_store_id: "DS001".into(),
            category: "Dairy".into(),
            quantity_ordered: 6,
            quantity_fulfilled: 4,
            delivery_time_minutes: 11.5,
            csat_score: 4.2,
            customer_lat: Some(12.97),
            customer_lon: Some(77.60),
        }
    }

    #[test]
    fn converts_valid_row() {
        let tx = raw().to_transaction().unwrap();
        assert_eq!(tx.hour(), 18);
        assert_eq!(tx.shortfall(), 2);
        assert_eq!(tx.customer_location, Some(GeoPoint::new(12.97, 77.60)));
    }

    #[test]
    fn rejects_over_fulfilled_row() {
        let mut r = raw();
        r.quantity_fulfilled = 9;
        assert_eq!(r.to_transaction(), Err(RowIssue::OverFulfilled));
    }

    #[test]
    fn rejects_half_location() {
        let mut r = raw();
        r.customer_lon = None;
        assert_eq!(r.to_transaction(), Err(RowIssue::HalfLocation));
    }

    #[test]
    fn rejects_bad_timestamp_and_csat() {
        let mut r = raw();
        r.timestamp = "04/03/2024".into();
        assert_eq!(r.to_transaction(), Err(RowIssue::BadTimestamp));

        let mut r = raw();
        r.csat_score = 7.0;
        assert_eq!(r.to_transaction(), Err(RowIssue::CsatOutOfRange));
    }

    #[test]
    fn rejects_non_finite_location() {
        let mut r = raw();
        r.customer_lat = Some(f64::NAN);
        assert_eq!(r.to_transaction(), Err(RowIssue::BadCoordinates));
    }

    fn item() -> InventoryItem {
        InventoryItem {
            store_id: "DS001".into(),
            product_name: "Milk 500ml".into(),
            category: "Dairy".into(),
            current_stock: 10.0,
            lead_time_hours: Some(12.0),
            storage_cost_per_unit: Some(2.5),
            supplier_reliability: Some(0.9),
        }
    }

    #[test]
    fn rejects_infinite_or_negative_inventory_figures() {
        assert_eq!(item().check(), Ok(()));

        let mut i = item();
        i.lead_time_hours = Some(f64::INFINITY);
        assert_eq!(i.check(), Err(RowIssue::InvalidLeadTime));

        let mut i = item();
        i.storage_cost_per_unit = Some(-1.0);
        assert_eq!(i.check(), Err(RowIssue::InvalidUnitCost));

        let mut i = item();
        i.supplier_reliability = Some(1.5);
        assert_eq!(i.check(), Err(RowIssue::InvalidReliability));

        let mut i = item();
        i.lead_time_hours = None;
        i.storage_cost_per_unit = None;
        i.supplier_reliability = None;
        assert_eq!(i.check(), Ok(()));
    }
}
