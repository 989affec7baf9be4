//! Analysis parameters and their layering
//!
//! Defaults are overridden by a TOML file, then by `DSA_*` environment
//! variables, then by CLI flags. A config file must state the service level and
//! the lead times itself; every downstream number depends on them.

use crate::error::{AnalyticsError, Result};
use crate::models::{DarkStore, GeoPoint};
use crate::store_names::{DARK_STORES, DEFAULT_CATEGORIES};
use geo::algorithm::intersects::Intersects;
use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Plausible region for customer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Closed box: points on an edge are inside
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.to_point().intersects(&self.to_rect())
    }
}

impl Default for BoundingBox {
    // Bangalore metro region
    fn default() -> Self {
        Self {
            min_lat: 12.70,
            max_lat: 13.25,
            min_lon: 77.35,
            max_lon: 77.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub service_level: f64,
    pub default_lead_time_days: Option<f64>,
    pub lead_time_days: BTreeMap<String, f64>,
    pub peak_multiplier: f64,
    pub min_sample_count: usize,
    pub fallback_safety_margin: f64,
    pub min_r_squared: f64,
    pub moving_average_window: usize,
    pub forecast_horizon_hours: usize,
    pub holding_cost_rate: f64,
    pub order_cost: f64,
    pub default_unit_cost: f64,
    pub stockout_cost_per_unit: f64,
    pub zone_percentile: f64,
    pub bounding_box: BoundingBox,
    pub target_delivery_minutes: f64,
    pub default_coverage_radius_km: f64,
    /// Transactions dated further than this from the median date are dropped
    pub max_span_days: i64,
    pub stores: Vec<DarkStore>,
    pub categories: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let default_coverage_radius_km = 3.0;
        Self {
            service_level: 0.95,
            default_lead_time_days: Some(1.0),
            lead_time_days: BTreeMap::new(),
            peak_multiplier: 1.5,
            min_sample_count: 5,
            fallback_safety_margin: 0.25,
            min_r_squared: 0.5,
            moving_average_window: 24,
            forecast_horizon_hours: 24,
            holding_cost_rate: 0.20,
            order_cost: 50.0,
            default_unit_cost: 10.0,
            stockout_cost_per_unit: 5.0,
            zone_percentile: 0.95,
            bounding_box: BoundingBox::default(),
            target_delivery_minutes: 12.0,
            default_coverage_radius_km,
            max_span_days: 366,
            stores: DARK_STORES
                .iter()
                .map(|(id, (name, lat, lon))| DarkStore {
                    store_id: id.to_string(),
                    name: name.to_string(),
                    location: GeoPoint::new(*lat, *lon),
                    coverage_radius_km: default_coverage_radius_km,
                })
                .collect(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// On-disk shape of the config file; every key is optional at parse time
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    service_level: Option<f64>,
    default_lead_time_days: Option<f64>,
    lead_time_days: Option<BTreeMap<String, f64>>,
    peak_multiplier: Option<f64>,
    min_sample_count: Option<usize>,
    fallback_safety_margin: Option<f64>,
    min_r_squared: Option<f64>,
    moving_average_window: Option<usize>,
    forecast_horizon_hours: Option<usize>,
    holding_cost_rate: Option<f64>,
    order_cost: Option<f64>,
    default_unit_cost: Option<f64>,
    stockout_cost_per_unit: Option<f64>,
    zone_percentile: Option<f64>,
    bounding_box: Option<BoundingBox>,
    target_delivery_minutes: Option<f64>,
    default_coverage_radius_km: Option<f64>,
    max_span_days: Option<i64>,
    stores: Option<Vec<FileStore>>,
    categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileStore {
    store_id: String,
    name: Option<String>,
    lat: f64,
    lon: f64,
    coverage_radius_km: Option<f64>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub service_level: Option<f64>,
    pub lead_time_days: Option<f64>,
    pub peak_multiplier: Option<f64>,
    pub zone_percentile: Option<f64>,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file on top of the current values
    pub fn load_from_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| AnalyticsError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file {}: {}", path.as_ref().display(), e),
        })?;
        self.load_from_toml(&content)
    }

    pub fn load_from_toml(mut self, content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content).map_err(|e| AnalyticsError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })?;

        self.service_level = file.service_level.ok_or_else(|| AnalyticsError::ConfigMissing {
            key: "service_level".to_string(),
        })?;

        if file.default_lead_time_days.is_none() && file.lead_time_days.is_none() {
            return Err(AnalyticsError::ConfigMissing {
                key: "default_lead_time_days".to_string(),
            });
        }
        // Lead times in a file replace the built-in default entirely
        self.default_lead_time_days = file.default_lead_time_days;
        self.lead_time_days = file.lead_time_days.unwrap_or_default();

        if let Some(v) = file.peak_multiplier {
            self.peak_multiplier = v;
        }
        if let Some(v) = file.min_sample_count {
            self.min_sample_count = v;
        }
        if let Some(v) = file.fallback_safety_margin {
            self.fallback_safety_margin = v;
        }
        if let Some(v) = file.min_r_squared {
            self.min_r_squared = v;
        }
        if let Some(v) = file.moving_average_window {
            self.moving_average_window = v;
        }
        if let Some(v) = file.forecast_horizon_hours {
            self.forecast_horizon_hours = v;
        }
        if let Some(v) = file.holding_cost_rate {
            self.holding_cost_rate = v;
        }
        if let Some(v) = file.order_cost {
            self.order_cost = v;
        }
        if let Some(v) = file.default_unit_cost {
            self.default_unit_cost = v;
        }
        if let Some(v) = file.stockout_cost_per_unit {
            self.stockout_cost_per_unit = v;
        }
        if let Some(v) = file.zone_percentile {
            self.zone_percentile = v;
        }
        if let Some(v) = file.bounding_box {
            self.bounding_box = v;
        }
        if let Some(v) = file.target_delivery_minutes {
            self.target_delivery_minutes = v;
        }
        if let Some(v) = file.default_coverage_radius_km {
            self.default_coverage_radius_km = v;
        }
        if let Some(v) = file.max_span_days {
            self.max_span_days = v;
        }
        if let Some(categories) = file.categories {
            self.categories = categories;
        }
        if let Some(stores) = file.stores {
            let radius = self.default_coverage_radius_km;
            self.stores = stores
                .into_iter()
                .map(|s| DarkStore {
                    name: s
                        .name
                        .unwrap_or_else(|| crate::store_names::get_store_name(&s.store_id)),
                    store_id: s.store_id,
                    location: GeoPoint::new(s.lat, s.lon),
                    coverage_radius_km: s.coverage_radius_km.unwrap_or(radius),
                })
                .collect();
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Some(v) = env_f64("DSA_SERVICE_LEVEL") {
            self.service_level = v;
        }
        if let Some(v) = env_f64("DSA_LEAD_TIME_DAYS") {
            self.default_lead_time_days = Some(v);
        }
        if let Some(v) = env_f64("DSA_PEAK_MULTIPLIER") {
            self.peak_multiplier = v;
        }
        if let Some(v) = env_f64("DSA_ZONE_PERCENTILE") {
            self.zone_percentile = v;
        }
        self
    }

    pub fn apply_cli(mut self, overrides: &CliOverrides) -> Self {
        if let Some(v) = overrides.service_level {
            self.service_level = v;
        }
        if let Some(v) = overrides.lead_time_days {
            self.default_lead_time_days = Some(v);
        }
        if let Some(v) = overrides.peak_multiplier {
            self.peak_multiplier = v;
        }
        if let Some(v) = overrides.zone_percentile {
            self.zone_percentile = v;
        }
        self
    }

    /// Resolve the supplier lead time for a category, in days
    pub fn lead_time_for(&self, category: &str) -> Result<f64> {
        self.lead_time_days
            .get(category)
            .copied()
            .or(self.default_lead_time_days)
            .ok_or_else(|| AnalyticsError::ConfigMissing {
                key: format!("lead_time_days.{}", category),
            })
    }

    /// Reject parameter sets no analysis can run with
    pub fn validate(&self) -> Result<()> {
        if !(self.service_level > 0.5 && self.service_level < 1.0) {
            return Err(invalid("service_level", "must be in (0.5, 1.0)"));
        }
        if let Some(d) = self.default_lead_time_days {
            if !(d > 0.0) {
                return Err(invalid("default_lead_time_days", "must be positive"));
            }
        }
        for (category, days) in &self.lead_time_days {
            if !(*days > 0.0) {
                return Err(invalid(&format!("lead_time_days.{}", category), "must be positive"));
            }
        }
        for category in &self.categories {
            self.lead_time_for(category)?;
        }
        if !(self.peak_multiplier > 0.0) {
            return Err(invalid("peak_multiplier", "must be positive"));
        }
        if self.min_sample_count < 2 {
            return Err(invalid("min_sample_count", "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&self.fallback_safety_margin) {
            return Err(invalid("fallback_safety_margin", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.min_r_squared) {
            return Err(invalid("min_r_squared", "must be in [0, 1]"));
        }
        if self.moving_average_window == 0 {
            return Err(invalid("moving_average_window", "must be at least 1"));
        }
        if self.forecast_horizon_hours == 0 {
            return Err(invalid("forecast_horizon_hours", "must be at least 1"));
        }
        if !(self.holding_cost_rate > 0.0) {
            return Err(invalid("holding_cost_rate", "must be positive"));
        }
        if !(self.order_cost > 0.0) {
            return Err(invalid("order_cost", "must be positive"));
        }
        if !(self.default_unit_cost > 0.0) {
            return Err(invalid("default_unit_cost", "must be positive"));
        }
        if self.stockout_cost_per_unit < 0.0 {
            return Err(invalid("stockout_cost_per_unit", "must not be negative"));
        }
        if !(self.zone_percentile > 0.0 && self.zone_percentile <= 1.0) {
            return Err(invalid("zone_percentile", "must be in (0, 1]"));
        }
        let b = &self.bounding_box;
        if !(b.min_lat < b.max_lat && b.min_lon < b.max_lon) {
            return Err(invalid("bounding_box", "min must be below max"));
        }
        if !(self.target_delivery_minutes > 0.0) {
            return Err(invalid("target_delivery_minutes", "must be positive"));
        }
        if self.max_span_days < 1 {
            return Err(invalid("max_span_days", "must be at least 1"));
        }
        if self.stores.is_empty() {
            return Err(AnalyticsError::ConfigMissing {
                key: "stores".to_string(),
            });
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn env_f64(key: &str) -> Option<f64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected a number", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stores.len(), 5);
        assert_eq!(config.categories.len(), 8);
        assert_eq!(config.lead_time_for("Dairy").unwrap(), 1.0);
    }

    #[test]
    fn file_without_service_level_is_fatal() {
        let err = AnalysisConfig::default()
            .load_from_toml("default_lead_time_days = 2.0\n")
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::ConfigMissing { ref key } if key == "service_level"));
    }

    #[test]
    fn file_lead_times_replace_default() {
        let config = AnalysisConfig::default()
            .load_from_toml(
                r#"
service_level = 0.9
categories = ["Dairy", "Snacks"]

[lead_time_days]
Dairy = 0.5
"#,
            )
            .unwrap();
        assert_eq!(config.lead_time_for("Dairy").unwrap(), 0.5);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AnalyticsError::ConfigMissing { ref key } if key == "lead_time_days.Snacks"));
    }

    #[test]
    fn rejects_out_of_range_service_level() {
        let config = AnalysisConfig {
            service_level: 1.2,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::ConfigInvalid { ref key, .. }) if key == "service_level"
        ));
    }

    #[test]
    fn cli_overrides_win() {
        let config = AnalysisConfig::default().apply_cli(&CliOverrides {
            service_level: Some(0.99),
            lead_time_days: Some(2.0),
            ..CliOverrides::default()
        });
        assert_eq!(config.service_level, 0.99);
        assert_eq!(config.lead_time_for("Snacks").unwrap(), 2.0);
    }

    #[test]
    fn bounding_box_contains() {
        let b = BoundingBox::default();
        assert!(b.contains(&GeoPoint::new(12.97, 77.59)));
        assert!(!b.contains(&GeoPoint::new(19.07, 72.87)));
        assert!(b.contains(&GeoPoint::new(12.70, 77.85)));
        assert!(!b.contains(&GeoPoint::new(12.6999, 77.60)));
    }

    #[test]
    fn rejects_empty_date_window() {
        let config = AnalysisConfig {
            max_span_days: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::ConfigInvalid { ref key, .. }) if key == "max_span_days"
        ));
    }
}
