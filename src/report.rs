//! Report assembly
//!
//! Merges the demand, inventory and zone analyses into one serialisable
//! report. Beyond rounding for display, nothing here computes anything new.

use crate::config::AnalysisConfig;
use crate::demand::{self, DemandAnalysis, KeyMetrics};
use crate::error::Result;
use crate::inventory::{self, CostAnalysis, InventoryPolicy, RestockItem, Urgency};
use crate::loader::{Dataset, LoadWarnings};
use crate::stats::round_to;
use crate::zones::{self, DeliveryZone, TrafficPatterns, TravelTimeZone, ZoneAdjustment, ZoneOverlap};
use serde::Serialize;
use tracing::info;

const RATE_DECIMALS: i32 = 3;
const MONEY_DECIMALS: i32 = 2;
const DISTANCE_DECIMALS: i32 = 2;
const MINUTE_DECIMALS: i32 = 1;

const HIGH_OUT_OF_STOCK_RATE: f64 = 0.15;
const SLOW_DELIVERY_MINUTES: f64 = 15.0;
const HIGH_CANCELLATION_RATE: f64 = 0.10;
const HIGH_OVERLAP_PCT: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub key_metrics: KeyMetrics,
    pub cost_analysis: CostAnalysis,
    pub delivery_zones: Vec<DeliveryZone>,
    pub demand: DemandAnalysis,
    pub inventory: InventorySection,
    pub zone_planning: ZonePlanning,
    pub insights: Vec<Insight>,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySection {
    pub policies: Vec<InventoryPolicy>,
    pub restocking: Vec<RestockItem>,
    pub safety_stock_fallbacks: usize,
    pub forecast_fallbacks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonePlanning {
    pub travel_time_zones: Vec<TravelTimeZone>,
    pub overlaps: Vec<ZoneOverlap>,
    pub traffic: TrafficPatterns,
    pub adjustments: Vec<ZoneAdjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub files: Vec<LoadWarnings>,
    pub rows_skipped: usize,
    pub outlier_locations: usize,
    pub unconfigured: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsightKind {
    Critical,
    Important,
    Opportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub area: &'static str,
    pub message: String,
    pub recommendation: String,
}

/// Run every analysis over a loaded dataset and assemble the report
pub fn run_pipeline(dataset: &Dataset, config: &AnalysisConfig) -> Result<Report> {
    config.validate()?;

    let demand = demand::analyze(&dataset.transactions, config);
    let policies = inventory::build_policies(dataset, config)?;
    let restocking = inventory::restocking_schedule(&policies);
    let costs = inventory::cost_analysis(&policies, config);
    let zones = zones::analyze(&dataset.stores, &dataset.transactions, config);

    info!(
        "Analysed {} transactions: {} demand groups, {} policies, {} zones",
        dataset.transactions.len(),
        demand.summaries.len(),
        policies.len(),
        zones.zones.len()
    );

    Ok(build_report(dataset, demand, policies, restocking, costs, zones))
}

pub fn build_report(
    dataset: &Dataset,
    demand: DemandAnalysis,
    policies: Vec<InventoryPolicy>,
    restocking: Vec<RestockItem>,
    costs: CostAnalysis,
    zones: zones::ZoneAnalysis,
) -> Report {
    let insights = insights(&demand, &restocking, &zones.overlaps);

    let data_quality = DataQuality {
        files: dataset.warnings.clone(),
        rows_skipped: dataset.total_skipped(),
        outlier_locations: zones.zones.iter().map(|z| z.outliers_excluded).sum(),
        unconfigured: demand.unconfigured.clone(),
    };

    let inventory = InventorySection {
        safety_stock_fallbacks: policies.iter().filter(|p| p.safety_stock.is_fallback()).count(),
        forecast_fallbacks: policies.iter().filter(|p| p.forecast.is_fallback()).count(),
        policies: policies.iter().map(round_policy).collect(),
        restocking: restocking.iter().map(round_restock).collect(),
    };

    Report {
        key_metrics: round_key_metrics(&demand.key_metrics),
        cost_analysis: round_costs(&costs),
        delivery_zones: zones.zones.iter().map(round_zone).collect(),
        demand,
        inventory,
        zone_planning: ZonePlanning {
            travel_time_zones: zones.travel_time_zones,
            overlaps: zones.overlaps,
            traffic: zones.traffic,
            adjustments: zones.adjustments,
        },
        insights,
        data_quality,
    }
}

fn insights(demand: &DemandAnalysis, restocking: &[RestockItem], overlaps: &[ZoneOverlap]) -> Vec<Insight> {
    let metrics = &demand.key_metrics;
    let mut found = Vec::new();

    if metrics.out_of_stock_rate > HIGH_OUT_OF_STOCK_RATE {
        found.push(Insight {
            kind: InsightKind::Critical,
            area: "Inventory",
            message: format!("Out-of-stock rate of {:.1}% requires immediate attention", metrics.out_of_stock_rate * 100.0),
            recommendation: "Reorder dynamically from demand patterns".to_string(),
        });
    }
    if metrics.avg_delivery_time > SLOW_DELIVERY_MINUTES {
        found.push(Insight {
            kind: InsightKind::Important,
            area: "Delivery",
            message: format!("Average delivery time of {:.1} minutes exceeds target", metrics.avg_delivery_time),
            recommendation: "Tighten delivery zones or add dark stores".to_string(),
        });
    }
    if metrics.cancellation_rate > HIGH_CANCELLATION_RATE {
        found.push(Insight {
            kind: InsightKind::Critical,
            area: "Operations",
            message: format!("Cancellation rate of {:.1}%", metrics.cancellation_rate * 100.0),
            recommendation: "Improve stock availability during peak hours".to_string(),
        });
    }
    if !demand.peak_hours.is_empty() {
        let hours: Vec<String> = demand.peak_hours.iter().take(3).map(|h| format!("{:02}:00", h.hour)).collect();
        found.push(Insight {
            kind: InsightKind::Opportunity,
            area: "Demand",
            message: format!("Peak demand hours are {}", hours.join(", ")),
            recommendation: "Pre-position inventory and staff up for these hours".to_string(),
        });
    }
    if let Some((category, perf)) = demand
        .categories
        .iter()
        .min_by(|a, b| a.1.fulfillment_rate.total_cmp(&b.1.fulfillment_rate))
    {
        found.push(Insight {
            kind: InsightKind::Important,
            area: "Product",
            message: format!(
                "Lowest performing category is {} with {:.1}% fulfillment",
                category,
                perf.fulfillment_rate * 100.0
            ),
            recommendation: format!("Focus inventory optimization on {}", category),
        });
    }

    let urgent = restocking.iter().filter(|r| r.urgency >= Urgency::High).count();
    if urgent > 0 {
        found.push(Insight {
            kind: InsightKind::Critical,
            area: "Inventory",
            message: format!("{} store categories need an urgent restock", urgent),
            recommendation: "Place the suggested orders in the restocking schedule".to_string(),
        });
    }

    let crowded: Vec<String> = overlaps
        .iter()
        .filter(|o| o.overlap_pct > HIGH_OVERLAP_PCT)
        .map(|o| format!("{}/{}", o.store_a, o.store_b))
        .collect();
    if !crowded.is_empty() {
        found.push(Insight {
            kind: InsightKind::Opportunity,
            area: "Zones",
            message: format!("High zone overlap between {}", crowded.join(", ")),
            recommendation: "Redistribute overlapping delivery zones".to_string(),
        });
    }

    found
}

// ============================================================================
// Display rounding
// ============================================================================

fn round_key_metrics(m: &KeyMetrics) -> KeyMetrics {
    KeyMetrics {
        fulfillment_rate: round_to(m.fulfillment_rate, RATE_DECIMALS),
        cancellation_rate: round_to(m.cancellation_rate, RATE_DECIMALS),
        out_of_stock_rate: round_to(m.out_of_stock_rate, RATE_DECIMALS),
        avg_delivery_time: round_to(m.avg_delivery_time, MINUTE_DECIMALS),
        delivery_time_std: round_to(m.delivery_time_std, MINUTE_DECIMALS),
        avg_csat_score: round_to(m.avg_csat_score, 2),
        csat_below_3_share: round_to(m.csat_below_3_share, RATE_DECIMALS),
        ..m.clone()
    }
}

fn round_costs(c: &CostAnalysis) -> CostAnalysis {
    let money = |v: f64| round_to(v, MONEY_DECIMALS);
    CostAnalysis {
        total_holding_cost_daily: money(c.total_holding_cost_daily),
        total_stockout_cost_daily: money(c.total_stockout_cost_daily),
        total_inventory_cost_daily: money(c.total_inventory_cost_daily),
        cost_by_category: c.cost_by_category.iter().map(|(k, v)| (k.clone(), money(*v))).collect(),
        cost_by_store: c.cost_by_store.iter().map(|(k, v)| (k.clone(), money(*v))).collect(),
    }
}

fn round_zone(z: &DeliveryZone) -> DeliveryZone {
    DeliveryZone {
        radius_km: round_to(z.radius_km, DISTANCE_DECIMALS),
        estimated_coverage_area_km2: round_to(z.estimated_coverage_area_km2, DISTANCE_DECIMALS),
        avg_distance_km: round_to(z.avg_distance_km, DISTANCE_DECIMALS),
        max_distance_km: round_to(z.max_distance_km, DISTANCE_DECIMALS),
        ..z.clone()
    }
}

fn round_policy(p: &InventoryPolicy) -> InventoryPolicy {
    InventoryPolicy {
        lead_time_days: round_to(p.lead_time_days, 2),
        mean_daily_demand: round_to(p.mean_daily_demand, 2),
        reorder_point: round_to(p.reorder_point, 2),
        reorder_quantity: round_to(p.reorder_quantity, 2),
        max_stock: round_to(p.max_stock, 2),
        unit_cost: round_to(p.unit_cost, MONEY_DECIMALS),
        ..p.clone()
    }
}

fn round_restock(r: &RestockItem) -> RestockItem {
    RestockItem {
        lead_time_hours: round_to(r.lead_time_hours, 2),
        forecast_demand: round_to(r.forecast_demand, 2),
        projected_stock: round_to(r.projected_stock, 2),
        reorder_point: round_to(r.reorder_point, 2),
        suggested_order_qty: round_to(r.suggested_order_qty, 2),
        ..r.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Transaction, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn tx(ts: &str, store: &str, ordered: u32, fulfilled: u32, minutes: f64) -> Transaction {
        Transaction {
            timestamp: NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap(),
            store_id: store.into(),
            category: "Snacks".into(),
            quantity_ordered: ordered,
            quantity_fulfilled: fulfilled,
            delivery_time_minutes: minutes,
            customer_satisfaction: 4.0,
            customer_location: Some(GeoPoint::new(12.98, 77.60)),
        }
    }

    fn dataset() -> Dataset {
        let config = AnalysisConfig::default();
        Dataset {
            transactions: vec![
                tx("2024-03-04 18:05:00", "DS001", 10, 6, 17.25),
                tx("2024-03-04 19:10:00", "DS001", 5, 5, 16.0),
                tx("2024-03-05 11:00:00", "DS002", 5, 5, 9.0),
            ],
            stores: config.stores.clone(),
            ..Dataset::default()
        }
    }

    #[test]
    fn report_has_required_sections() {
        let report = run_pipeline(&dataset(), &AnalysisConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        for section in ["key_metrics", "cost_analysis", "delivery_zones"] {
            assert!(json.get(section).is_some(), "missing {}", section);
        }
        assert_eq!(report.delivery_zones.len(), 5);
        assert_eq!(report.inventory.policies.len(), 40);
    }

    #[test]
    fn key_metrics_are_rounded_for_display() {
        let report = run_pipeline(&dataset(), &AnalysisConfig::default()).unwrap();
        // 4 of 20 units short
        assert_eq!(report.key_metrics.out_of_stock_rate, 0.2);
        assert_eq!(report.key_metrics.avg_delivery_time, 14.1);
    }

    #[test]
    fn insights_flag_high_out_of_stock() {
        let report = run_pipeline(&dataset(), &AnalysisConfig::default()).unwrap();
        assert!(report
            .insights
            .iter()
            .any(|i| i.kind == InsightKind::Critical && i.area == "Inventory"));
        assert!(report.insights.iter().any(|i| i.area == "Demand"));
    }

    #[test]
    fn invalid_config_is_fatal() {
        let config = AnalysisConfig {
            stores: Vec::new(),
            ..AnalysisConfig::default()
        };
        assert!(run_pipeline(&dataset(), &config).is_err());
    }
}
