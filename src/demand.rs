//! Demand aggregation
//!
//! Groups transactions by any combination of store, category and hour of day.
//! The sample unit is the hourly slot: a group's mean demand is the units
//! ordered per slot it covers across the observed calendar span, with slots
//! that saw no orders counted as zero. Configured stores and categories with no
//! data still get a (zero) group.

use crate::config::AnalysisConfig;
use crate::models::Transaction;
use crate::stats;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const HOURS_PER_DAY: usize = 24;

// ============================================================================
// Grouping
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouping {
    pub by_store: bool,
    pub by_category: bool,
    pub by_hour: bool,
}

impl Grouping {
    pub const STORE_CATEGORY_HOUR: Grouping = Grouping { by_store: true, by_category: true, by_hour: true };
    pub const STORE_CATEGORY: Grouping = Grouping { by_store: true, by_category: true, by_hour: false };
    pub const CATEGORY: Grouping = Grouping { by_store: false, by_category: true, by_hour: false };
    pub const HOUR: Grouping = Grouping { by_store: false, by_category: false, by_hour: true };

    fn key_for(&self, tx: &Transaction) -> GroupKey {
        GroupKey {
            store_id: self.by_store.then(|| tx.store_id.clone()),
            category: self.by_category.then(|| tx.category.clone()),
            hour_of_day: self.by_hour.then(|| tx.hour()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<u8>,
}

/// Per-group demand statistics. Derived on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSummary {
    #[serde(flatten)]
    pub key: GroupKey,
    /// Transactions in the group
    pub count: usize,
    /// Hourly slots the statistics are taken over
    pub slots: usize,
    pub total_demand: f64,
    pub mean_demand: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub peak_flag: bool,
}

// ============================================================================
// Observation span
// ============================================================================

/// Calendar days covered by a dataset, first to last inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObservationSpan {
    pub start: Option<NaiveDate>,
    pub days: usize,
}

impl ObservationSpan {
    pub fn of(transactions: &[Transaction]) -> Self {
        let first = transactions.iter().map(|t| t.date()).min();
        let last = transactions.iter().map(|t| t.date()).max();
        match (first, last) {
            (Some(first), Some(last)) => Self {
                start: Some(first),
                days: ((last - first).num_days() + 1) as usize,
            },
            _ => Self { start: None, days: 0 },
        }
    }

    pub fn hours(&self) -> usize {
        self.days * HOURS_PER_DAY
    }

    /// Hour index of a transaction since the start of the span
    fn slot_of(&self, tx: &Transaction) -> Option<usize> {
        let start = self.start?;
        let day = (tx.date() - start).num_days();
        if day < 0 || day as usize >= self.days {
            return None;
        }
        Some(day as usize * HOURS_PER_DAY + tx.hour() as usize)
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Aggregate transactions into per-group statistics and flag peaks.
///
/// A group is a peak when its mean exceeds `peak_multiplier` times the mean of
/// all group means.
pub fn aggregate(transactions: &[Transaction], grouping: Grouping, config: &AnalysisConfig) -> Vec<DemandSummary> {
    let span = ObservationSpan::of(transactions);

    // key -> (transaction count, units per hourly slot)
    let mut groups: BTreeMap<GroupKey, (usize, BTreeMap<usize, f64>)> = BTreeMap::new();
    for tx in transactions {
        let Some(slot) = span.slot_of(tx) else { continue };
        let entry = groups.entry(grouping.key_for(tx)).or_default();
        entry.0 += 1;
        *entry.1.entry(slot).or_insert(0.0) += tx.quantity_ordered as f64;
    }

    for key in configured_keys(grouping, config) {
        groups.entry(key).or_default();
    }

    let mut summaries: Vec<DemandSummary> = groups
        .into_iter()
        .map(|(key, (count, by_slot))| {
            let samples: Vec<f64> = group_slots(&key, &span)
                .map(|slot| by_slot.get(&slot).copied().unwrap_or(0.0))
                .collect();
            let variance = stats::sample_variance(&samples);
            DemandSummary {
                count,
                slots: samples.len(),
                total_demand: samples.iter().sum(),
                mean_demand: stats::mean(&samples),
                variance,
                std_dev: variance.sqrt(),
                peak_flag: false,
                key,
            }
        })
        .collect();

    let baseline = stats::mean(&summaries.iter().map(|s| s.mean_demand).collect::<Vec<_>>());
    for summary in &mut summaries {
        summary.peak_flag = summary.count > 0 && summary.mean_demand > config.peak_multiplier * baseline;
    }

    summaries
}

/// Slots a group's statistics are taken over
fn group_slots<'a>(key: &'a GroupKey, span: &'a ObservationSpan) -> impl Iterator<Item = usize> + 'a {
    (0..span.hours()).filter(move |slot| match key.hour_of_day {
        Some(h) => slot % HOURS_PER_DAY == h as usize,
        None => true,
    })
}

/// Every key the configuration says should exist, data or not
fn configured_keys(grouping: Grouping, config: &AnalysisConfig) -> Vec<GroupKey> {
    let stores: Vec<Option<String>> = if grouping.by_store {
        config.stores.iter().map(|s| Some(s.store_id.clone())).collect()
    } else {
        vec![None]
    };
    let categories: Vec<Option<String>> = if grouping.by_category {
        config.categories.iter().map(|c| Some(c.clone())).collect()
    } else {
        vec![None]
    };
    let hours: Vec<Option<u8>> = if grouping.by_hour {
        (0..HOURS_PER_DAY as u8).map(Some).collect()
    } else {
        vec![None]
    };

    let mut keys = Vec::with_capacity(stores.len() * categories.len() * hours.len());
    for store_id in &stores {
        for category in &categories {
            for hour_of_day in &hours {
                keys.push(GroupKey {
                    store_id: store_id.clone(),
                    category: category.clone(),
                    hour_of_day: *hour_of_day,
                });
            }
        }
    }
    keys
}

/// Units ordered per calendar day for one store and category, zero-filled
pub fn daily_demand(transactions: &[Transaction], span: &ObservationSpan, store_id: &str, category: &str) -> Vec<f64> {
    let hourly = hourly_demand(transactions, span, store_id, category);
    hourly.chunks(HOURS_PER_DAY).map(|day| day.iter().sum()).collect()
}

/// Units ordered per hourly slot for one store and category, zero-filled
pub fn hourly_demand(transactions: &[Transaction], span: &ObservationSpan, store_id: &str, category: &str) -> Vec<f64> {
    let mut series = vec![0.0; span.hours()];
    for tx in transactions
        .iter()
        .filter(|t| t.store_id == store_id && t.category == category)
    {
        if let Some(slot) = span.slot_of(tx) {
            series[slot] += tx.quantity_ordered as f64;
        }
    }
    series
}

// ============================================================================
// Performance breakdowns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourDemand {
    pub hour: u8,
    pub total_demand: f64,
}

/// Top `n` hours of the day by total units ordered
pub fn peak_hours(transactions: &[Transaction], n: usize) -> Vec<HourDemand> {
    let mut totals = [0.0f64; HOURS_PER_DAY];
    for tx in transactions {
        totals[tx.hour() as usize] += tx.quantity_ordered as f64;
    }
    let mut hours: Vec<HourDemand> = totals
        .iter()
        .enumerate()
        .filter(|(_, total)| **total > 0.0)
        .map(|(hour, total)| HourDemand { hour: hour as u8, total_demand: *total })
        .collect();
    hours.sort_by(|a, b| b.total_demand.total_cmp(&a.total_demand).then(a.hour.cmp(&b.hour)));
    hours.truncate(n);
    hours
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPerformance {
    pub orders: usize,
    pub units_ordered: f64,
    pub units_fulfilled: f64,
    pub mean_order_size: f64,
    pub order_size_std: f64,
    pub fulfillment_rate: f64,
    pub mean_delivery_minutes: f64,
    pub mean_csat: f64,
}

fn segment_performance(txs: &[&Transaction]) -> SegmentPerformance {
    let sizes: Vec<f64> = txs.iter().map(|t| t.quantity_ordered as f64).collect();
    let ordered: f64 = sizes.iter().sum();
    let fulfilled: f64 = txs.iter().map(|t| t.quantity_fulfilled as f64).sum();
    let delivery: Vec<f64> = txs.iter().map(|t| t.delivery_time_minutes).collect();
    let csat: Vec<f64> = txs.iter().map(|t| t.customer_satisfaction).collect();
    SegmentPerformance {
        orders: txs.len(),
        units_ordered: ordered,
        units_fulfilled: fulfilled,
        mean_order_size: stats::mean(&sizes),
        order_size_std: stats::std_dev(&sizes),
        fulfillment_rate: if ordered > 0.0 { fulfilled / ordered } else { 0.0 },
        mean_delivery_minutes: stats::mean(&delivery),
        mean_csat: stats::mean(&csat),
    }
}

fn performance_by<F>(transactions: &[Transaction], key: F) -> BTreeMap<String, SegmentPerformance>
where
    F: Fn(&Transaction) -> &str,
{
    let mut segments: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        segments.entry(key(tx).to_string()).or_default().push(tx);
    }
    segments
        .into_iter()
        .map(|(k, txs)| (k, segment_performance(&txs)))
        .collect()
}

pub fn category_performance(transactions: &[Transaction]) -> BTreeMap<String, SegmentPerformance> {
    performance_by(transactions, |t| t.category.as_str())
}

pub fn store_performance(transactions: &[Transaction]) -> BTreeMap<String, SegmentPerformance> {
    performance_by(transactions, |t| t.store_id.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    HighShortfall,
    SlowDelivery,
    LowSatisfaction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub hour: u8,
    pub category: String,
    pub value: f64,
}

const SHORTFALL_THRESHOLD: f64 = 0.20;
const SLOW_DELIVERY_MINUTES: f64 = 20.0;
const LOW_CSAT: f64 = 3.5;

/// Hour x category slots with high unfulfilled share, slow delivery, or low csat
pub fn bottlenecks(transactions: &[Transaction]) -> Vec<Bottleneck> {
    let mut slots: BTreeMap<(u8, String), Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        slots.entry((tx.hour(), tx.category.clone())).or_default().push(tx);
    }

    let mut found = Vec::new();
    for ((hour, category), txs) in slots {
        let perf = segment_performance(&txs);
        let shortfall = 1.0 - perf.fulfillment_rate;
        if perf.units_ordered > 0.0 && shortfall > SHORTFALL_THRESHOLD {
            found.push(Bottleneck { kind: BottleneckKind::HighShortfall, hour, category: category.clone(), value: shortfall });
        }
        if perf.mean_delivery_minutes > SLOW_DELIVERY_MINUTES {
            found.push(Bottleneck { kind: BottleneckKind::SlowDelivery, hour, category: category.clone(), value: perf.mean_delivery_minutes });
        }
        if perf.mean_csat < LOW_CSAT {
            found.push(Bottleneck { kind: BottleneckKind::LowSatisfaction, hour, category, value: perf.mean_csat });
        }
    }
    found.sort_by(|a, b| a.kind.cmp(&b.kind).then(b.value.total_cmp(&a.value)));
    found
}

// ============================================================================
// Key metrics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub orders: usize,
    pub units_ordered: f64,
    pub units_fulfilled: f64,
    pub units_unfulfilled: f64,
    pub fulfillment_rate: f64,
    pub cancellation_rate: f64,
    pub out_of_stock_rate: f64,
    pub avg_delivery_time: f64,
    pub delivery_time_std: f64,
    pub avg_csat_score: f64,
    pub csat_below_3_share: f64,
}

pub fn key_metrics(transactions: &[Transaction]) -> KeyMetrics {
    let ordered: f64 = transactions.iter().map(|t| t.quantity_ordered as f64).sum();
    let fulfilled: f64 = transactions.iter().map(|t| t.quantity_fulfilled as f64).sum();
    let shortfall: f64 = transactions.iter().map(|t| t.shortfall() as f64).sum();
    let delivery: Vec<f64> = transactions.iter().map(|t| t.delivery_time_minutes).collect();
    let csat: Vec<f64> = transactions.iter().map(|t| t.customer_satisfaction).collect();
    let below_3 = csat.iter().filter(|c| **c < 3.0).count();

    let (fulfillment_rate, out_of_stock_rate) = if ordered > 0.0 {
        (fulfilled / ordered, shortfall / ordered)
    } else {
        (0.0, 0.0)
    };

    KeyMetrics {
        orders: transactions.len(),
        units_ordered: ordered,
        units_fulfilled: fulfilled,
        units_unfulfilled: shortfall,
        fulfillment_rate,
        cancellation_rate: if ordered > 0.0 { 1.0 - fulfillment_rate } else { 0.0 },
        out_of_stock_rate,
        avg_delivery_time: stats::mean(&delivery),
        delivery_time_std: stats::std_dev(&delivery),
        avg_csat_score: stats::mean(&csat),
        csat_below_3_share: if csat.is_empty() { 0.0 } else { below_3 as f64 / csat.len() as f64 },
    }
}

// ============================================================================
// Full demand analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandAnalysis {
    pub span: ObservationSpan,
    pub summaries: Vec<DemandSummary>,
    pub hourly_profile: Vec<DemandSummary>,
    pub peak_hours: Vec<HourDemand>,
    pub categories: BTreeMap<String, SegmentPerformance>,
    pub stores: BTreeMap<String, SegmentPerformance>,
    pub bottlenecks: Vec<Bottleneck>,
    pub key_metrics: KeyMetrics,
    /// Stores or categories seen in the data but absent from configuration
    pub unconfigured: Vec<String>,
}

pub fn analyze(transactions: &[Transaction], config: &AnalysisConfig) -> DemandAnalysis {
    let configured_stores: BTreeSet<&str> = config.stores.iter().map(|s| s.store_id.as_str()).collect();
    let configured_categories: BTreeSet<&str> = config.categories.iter().map(|c| c.as_str()).collect();
    let mut unconfigured = BTreeSet::new();
    for tx in transactions {
        if !configured_stores.contains(tx.store_id.as_str()) {
            unconfigured.insert(format!("store:{}", tx.store_id));
        }
        if !configured_categories.contains(tx.category.as_str()) {
            unconfigured.insert(format!("category:{}", tx.category));
        }
    }
    if !unconfigured.is_empty() {
        tracing::warn!("{} unconfigured stores/categories present in data", unconfigured.len());
    }

    DemandAnalysis {
        span: ObservationSpan::of(transactions),
        summaries: aggregate(transactions, Grouping::STORE_CATEGORY_HOUR, config),
        hourly_profile: aggregate(transactions, Grouping::HOUR, config),
        peak_hours: peak_hours(transactions, 5),
        categories: category_performance(transactions),
        stores: store_performance(transactions),
        bottlenecks: bottlenecks(transactions),
        key_metrics: key_metrics(transactions),
        unconfigured: unconfigured.into_iter().collect(),
    }
}
