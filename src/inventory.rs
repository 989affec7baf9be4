//! Inventory policies, restocking schedule and inventory cost analysis
//!
//! One policy per store x category: configured pairs, pairs with stock on
//! hand, and pairs seen in transactions.

use crate::config::AnalysisConfig;
use crate::demand::{self, ObservationSpan};
use crate::error::Result;
use crate::forecast::{self, DemandForecast, SafetyStock};
use crate::loader::Dataset;
use crate::stats::{self, ErrorMetrics};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const HOURS_PER_DAY_F: f64 = demand::HOURS_PER_DAY as f64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryPolicy {
    pub store_id: String,
    pub category: String,
    pub product_count: usize,
    pub current_stock: f64,
    pub unit_cost: f64,
    pub mean_daily_demand: f64,
    pub daily_samples: usize,
    pub lead_time_days: f64,
    /// Mean on-time share of the category's suppliers, when reported
    pub supplier_reliability: Option<f64>,
    pub service_level: f64,
    pub safety_stock: SafetyStock,
    pub reorder_point: f64,
    pub reorder_quantity: f64,
    pub max_stock: f64,
    pub forecast: DemandForecast,
    pub model_evaluation: Option<ErrorMetrics>,
}

/// Stock position of a store x category, summed over its products
#[derive(Debug, Default)]
struct StockPosition {
    products: usize,
    stock: f64,
    lead_time_hours: Option<f64>,
    unit_costs: Vec<f64>,
    reliabilities: Vec<f64>,
}

pub fn build_policies(dataset: &Dataset, config: &AnalysisConfig) -> Result<Vec<InventoryPolicy>> {
    let span = ObservationSpan::of(&dataset.transactions);

    let mut positions: BTreeMap<(String, String), StockPosition> = BTreeMap::new();
    for store in &config.stores {
        for category in &config.categories {
            positions.entry((store.store_id.clone(), category.clone())).or_default();
        }
    }
    for item in &dataset.inventory {
        let pos = positions.entry((item.store_id.clone(), item.category.clone())).or_default();
        pos.products += 1;
        pos.stock += item.current_stock;
        // Slowest supplier governs the category
        if let Some(hours) = item.lead_time_hours.filter(|h| h.is_finite() && *h > 0.0) {
            pos.lead_time_hours = Some(pos.lead_time_hours.map_or(hours, |h: f64| h.max(hours)));
        }
        if let Some(cost) = item.storage_cost_per_unit.filter(|c| c.is_finite() && *c > 0.0) {
            pos.unit_costs.push(cost);
        }
        if let Some(reliability) = item.supplier_reliability.filter(|r| (0.0..=1.0).contains(r)) {
            pos.reliabilities.push(reliability);
        }
    }
    let seen: BTreeSet<(String, String)> = dataset
        .transactions
        .iter()
        .map(|t| (t.store_id.clone(), t.category.clone()))
        .collect();
    for key in seen {
        positions.entry(key).or_default();
    }

    positions
        .into_iter()
        .map(|((store_id, category), pos)| {
            let lead_time_days = match pos.lead_time_hours {
                Some(hours) => hours / HOURS_PER_DAY_F,
                None => config.lead_time_for(&category)?,
            };
            let unit_cost = if pos.unit_costs.is_empty() {
                config.default_unit_cost
            } else {
                stats::mean(&pos.unit_costs)
            };

            let daily = demand::daily_demand(&dataset.transactions, &span, &store_id, &category);
            let hourly = demand::hourly_demand(&dataset.transactions, &span, &store_id, &category);
            let mean_daily_demand = stats::mean(&daily);

            let safety_stock = forecast::safety_stock(&daily, lead_time_days, config);
            let reorder_point = forecast::reorder_point(mean_daily_demand, lead_time_days, &safety_stock);
            let reorder_quantity = forecast::economic_order_quantity(mean_daily_demand, unit_cost, config);

            Ok(InventoryPolicy {
                product_count: pos.products,
                current_stock: pos.stock,
                unit_cost,
                mean_daily_demand,
                daily_samples: daily.len(),
                lead_time_days,
                supplier_reliability: (!pos.reliabilities.is_empty()).then(|| stats::mean(&pos.reliabilities)),
                service_level: config.service_level,
                safety_stock,
                reorder_point,
                reorder_quantity,
                max_stock: reorder_point + reorder_quantity,
                forecast: forecast::forecast_demand(&hourly, config),
                model_evaluation: forecast::evaluate_trend(&hourly),
                store_id,
                category,
            })
        })
        .collect()
}

// ============================================================================
// Restocking schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockItem {
    pub store_id: String,
    pub category: String,
    pub current_stock: f64,
    pub lead_time_hours: f64,
    pub supplier_reliability: Option<f64>,
    pub forecast_demand: f64,
    pub forecast_is_fallback: bool,
    pub projected_stock: f64,
    pub reorder_point: f64,
    pub needs_restock: bool,
    pub urgency: Urgency,
    pub suggested_order_qty: f64,
}

/// Most urgent first, then lowest projected stock
pub fn restocking_schedule(policies: &[InventoryPolicy]) -> Vec<RestockItem> {
    let mut schedule: Vec<RestockItem> = policies
        .iter()
        .map(|p| {
            let forecast_demand = p.forecast.next_period_demand();
            let projected_stock = p.current_stock - forecast_demand;
            // Nothing sold and nothing expected: no order to place
            let idle = forecast_demand <= 0.0 && p.reorder_point <= 0.0;
            let needs_restock = !idle && projected_stock <= p.reorder_point;
            let urgency = if !needs_restock {
                Urgency::Low
            } else if projected_stock <= 0.0 {
                Urgency::Critical
            } else if projected_stock <= p.reorder_point * 0.5 {
                Urgency::High
            } else {
                Urgency::Medium
            };
            RestockItem {
                store_id: p.store_id.clone(),
                category: p.category.clone(),
                current_stock: p.current_stock,
                lead_time_hours: p.lead_time_days * HOURS_PER_DAY_F,
                supplier_reliability: p.supplier_reliability,
                forecast_demand,
                forecast_is_fallback: p.forecast.is_fallback(),
                projected_stock,
                reorder_point: p.reorder_point,
                needs_restock,
                urgency,
                suggested_order_qty: if needs_restock { (p.max_stock - p.current_stock).max(0.0) } else { 0.0 },
            }
        })
        .collect();

    schedule.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then(a.projected_stock.total_cmp(&b.projected_stock))
            .then_with(|| a.store_id.cmp(&b.store_id))
            .then_with(|| a.category.cmp(&b.category))
    });
    schedule
}

// ============================================================================
// Costs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostAnalysis {
    pub total_holding_cost_daily: f64,
    pub total_stockout_cost_daily: f64,
    pub total_inventory_cost_daily: f64,
    pub cost_by_category: BTreeMap<String, f64>,
    pub cost_by_store: BTreeMap<String, f64>,
}

/// Daily holding cost of the stock on hand plus expected lost-sale cost
pub fn cost_analysis(policies: &[InventoryPolicy], config: &AnalysisConfig) -> CostAnalysis {
    let mut holding_total = 0.0;
    let mut stockout_total = 0.0;
    let mut cost_by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut cost_by_store: BTreeMap<String, f64> = BTreeMap::new();

    for p in policies {
        let holding = p.current_stock * p.unit_cost * config.holding_cost_rate / 365.0;
        let demand = p.mean_daily_demand;
        let stockout = if demand > 0.0 {
            let probability = ((demand - p.current_stock) / demand).max(0.0);
            probability * demand * config.stockout_cost_per_unit
        } else {
            0.0
        };
        holding_total += holding;
        stockout_total += stockout;
        *cost_by_category.entry(p.category.clone()).or_insert(0.0) += holding + stockout;
        *cost_by_store.entry(p.store_id.clone()).or_insert(0.0) += holding + stockout;
    }

    CostAnalysis {
        total_holding_cost_daily: holding_total,
        total_stockout_cost_daily: stockout_total,
        total_inventory_cost_daily: holding_total + stockout_total,
        cost_by_category,
        cost_by_store,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InventoryItem, Transaction, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn tx(ts: &str, store: &str, category: &str, ordered: u32) -> Transaction {
        Transaction {
            timestamp: NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap(),
            store_id: store.into(),
            category: category.into(),
            quantity_ordered: ordered,
            quantity_fulfilled: ordered,
            delivery_time_minutes: 10.0,
            customer_satisfaction: 4.5,
            customer_location: None,
        }
    }

    fn item(store: &str, category: &str, stock: f64, lead_hours: Option<f64>) -> InventoryItem {
        InventoryItem {
            store_id: store.into(),
            product_name: format!("{} item", category),
            category: category.into(),
            current_stock: stock,
            lead_time_hours: lead_hours,
            storage_cost_per_unit: Some(4.0),
            supplier_reliability: Some(0.9),
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            transactions: vec![
                tx("2024-03-04 09:00:00", "DS001", "Dairy", 10),
                tx("2024-03-05 09:00:00", "DS001", "Dairy", 14),
            ],
            inventory: vec![
                item("DS001", "Dairy", 5.0, Some(12.0)),
                item("DS001", "Dairy", 3.0, Some(36.0)),
            ],
            ..Dataset::default()
        }
    }

    #[test]
    fn policies_cover_every_configured_pair() {
        let config = AnalysisConfig::default();
        let policies = build_policies(&dataset(), &config).unwrap();
        assert_eq!(policies.len(), 40);
        let empty = policies.iter().find(|p| p.store_id == "DS005" && p.category == "Snacks").unwrap();
        assert_eq!(empty.mean_daily_demand, 0.0);
        assert_eq!(empty.reorder_point, 0.0);
        assert_eq!(empty.lead_time_days, 1.0);
    }

    #[test]
    fn dairy_policy_uses_slowest_supplier_and_fallback() {
        let config = AnalysisConfig::default();
        let policies = build_policies(&dataset(), &config).unwrap();
        let dairy = policies.iter().find(|p| p.store_id == "DS001" && p.category == "Dairy").unwrap();
        assert_eq!(dairy.product_count, 2);
        assert_eq!(dairy.current_stock, 8.0);
        assert_eq!(dairy.lead_time_days, 1.5);
        assert_eq!(dairy.mean_daily_demand, 12.0);
        assert_eq!(dairy.daily_samples, 2);
        assert!(dairy.safety_stock.is_fallback());
        assert!((dairy.reorder_point - (12.0 * 1.5 + 0.25 * 12.0 * 1.5)).abs() < 1e-9);
        assert!(dairy.forecast.is_fallback());
    }

    #[test]
    fn schedule_orders_by_urgency() {
        let config = AnalysisConfig::default();
        let policies = build_policies(&dataset(), &config).unwrap();
        let schedule = restocking_schedule(&policies);
        assert_eq!(schedule[0].store_id, "DS001");
        assert_eq!(schedule[0].category, "Dairy");
        assert_eq!(schedule[0].urgency, Urgency::Critical);
        assert!(schedule[0].suggested_order_qty > 0.0);
        assert_eq!(schedule[0].lead_time_hours, 36.0);
        assert_eq!(schedule[0].supplier_reliability, Some(0.9));
        let idle = schedule.iter().find(|r| r.store_id == "DS005" && r.category == "Snacks").unwrap();
        assert_eq!(idle.lead_time_hours, 24.0);
        assert_eq!(idle.supplier_reliability, None);
        assert!(schedule.windows(2).all(|w| w[0].urgency >= w[1].urgency));
    }

    #[test]
    fn costs_split_holding_and_stockout() {
        let config = AnalysisConfig::default();
        let policies = build_policies(&dataset(), &config).unwrap();
        let costs = cost_analysis(&policies, &config);
        let holding = 8.0 * 4.0 * 0.2 / 365.0;
        let stockout = ((12.0 - 8.0) / 12.0) * 12.0 * 5.0;
        assert!((costs.total_holding_cost_daily - holding).abs() < 1e-9);
        assert!((costs.total_stockout_cost_daily - stockout).abs() < 1e-9);
        assert!((costs.cost_by_store["DS001"] - (holding + stockout)).abs() < 1e-9);
    }

    #[test]
    fn infinite_item_figures_fall_back_to_config() {
        let config = AnalysisConfig::default();
        let mut data = dataset();
        data.inventory = vec![InventoryItem {
            lead_time_hours: Some(f64::INFINITY),
            storage_cost_per_unit: Some(f64::INFINITY),
            ..item("DS001", "Dairy", 0.0, None)
        }];
        let policies = build_policies(&data, &config).unwrap();
        let dairy = policies.iter().find(|p| p.store_id == "DS001" && p.category == "Dairy").unwrap();
        assert_eq!(dairy.lead_time_days, 1.0);
        assert_eq!(dairy.unit_cost, config.default_unit_cost);
        assert!(dairy.reorder_point.is_finite());

        let costs = cost_analysis(&policies, &config);
        assert!(costs.total_inventory_cost_daily.is_finite());
        assert!(costs.total_inventory_cost_daily >= 0.0);
    }
}
