//! Demand forecasting and stock-level formulas
//!
//! Every estimate says which path produced it. A safety stock is either
//! statistical or a fixed-margin fallback; a demand forecast is either a
//! fitted trend or a moving-average fallback. Callers must never treat the
//! two paths as interchangeable numbers.

use crate::config::AnalysisConfig;
use crate::demand::HOURS_PER_DAY;
use crate::stats::{self, ErrorMetrics};
use serde::Serialize;

const DAYS_PER_YEAR: f64 = 365.0;
/// Order cover used when no holding cost is known
const FALLBACK_ORDER_DAYS: f64 = 7.0;
/// Share of the hourly history used to fit when evaluating the trend model
const TRAIN_SHARE: f64 = 0.8;

// ============================================================================
// Safety stock
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SafetyStock {
    /// z(service level) * daily std dev * sqrt(lead time)
    Statistical { z: f64, std_dev: f64, value: f64 },
    /// margin * mean daily demand * lead time, used when history is too short
    FallbackMargin { margin: f64, samples: usize, value: f64 },
}

impl SafetyStock {
    pub fn value(&self) -> f64 {
        match self {
            SafetyStock::Statistical { value, .. } | SafetyStock::FallbackMargin { value, .. } => *value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SafetyStock::FallbackMargin { .. })
    }
}

/// Safety stock from daily demand samples
pub fn safety_stock(daily_demand: &[f64], lead_time_days: f64, config: &AnalysisConfig) -> SafetyStock {
    let mean = stats::mean(daily_demand);
    let lead_time = lead_time_days.max(0.0);

    if daily_demand.len() < config.min_sample_count {
        return SafetyStock::FallbackMargin {
            margin: config.fallback_safety_margin,
            samples: daily_demand.len(),
            value: (config.fallback_safety_margin * mean * lead_time).max(0.0),
        };
    }

    let z = stats::inverse_normal_cdf(config.service_level);
    let std_dev = stats::std_dev(daily_demand);
    SafetyStock::Statistical {
        z,
        std_dev,
        value: (z * std_dev * lead_time.sqrt()).max(0.0),
    }
}

pub fn reorder_point(mean_daily_demand: f64, lead_time_days: f64, safety_stock: &SafetyStock) -> f64 {
    mean_daily_demand.max(0.0) * lead_time_days.max(0.0) + safety_stock.value()
}

/// Economic order quantity: sqrt(2 * annual demand * order cost / annual holding cost per unit)
pub fn economic_order_quantity(mean_daily_demand: f64, unit_cost: f64, config: &AnalysisConfig) -> f64 {
    let mean_daily_demand = mean_daily_demand.max(0.0);
    let holding_cost = unit_cost * config.holding_cost_rate;
    if holding_cost <= 0.0 {
        return mean_daily_demand * FALLBACK_ORDER_DAYS;
    }
    let annual_demand = mean_daily_demand * DAYS_PER_YEAR;
    (2.0 * annual_demand * config.order_cost / holding_cost).sqrt()
}

// ============================================================================
// Demand forecast
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    InsufficientSamples { samples: usize, required: usize },
    PoorFit { r_squared: f64 },
    ConstantSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DemandForecast {
    /// Linear trend over the hourly history, summed over the horizon
    Trend {
        next_period_demand: f64,
        slope: f64,
        intercept: f64,
        r_squared: f64,
    },
    /// Mean of the most recent `window` hours times the horizon
    MovingAverage {
        next_period_demand: f64,
        window: usize,
        reason: FallbackReason,
    },
}

impl DemandForecast {
    pub fn next_period_demand(&self) -> f64 {
        match self {
            DemandForecast::Trend { next_period_demand, .. }
            | DemandForecast::MovingAverage { next_period_demand, .. } => *next_period_demand,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DemandForecast::MovingAverage { .. })
    }
}

/// Project units demanded over the next `forecast_horizon_hours`.
///
/// The trend is used only when at least `min_sample_count` days of hourly
/// history exist and its R² reaches `min_r_squared`.
pub fn forecast_demand(hourly_demand: &[f64], config: &AnalysisConfig) -> DemandForecast {
    let required = config.min_sample_count * HOURS_PER_DAY;
    if hourly_demand.len() < required {
        return moving_average(
            hourly_demand,
            config,
            FallbackReason::InsufficientSamples {
                samples: hourly_demand.len(),
                required,
            },
        );
    }

    let Some(fit) = stats::fit_linear_trend(hourly_demand) else {
        return moving_average(
            hourly_demand,
            config,
            FallbackReason::InsufficientSamples {
                samples: hourly_demand.len(),
                required,
            },
        );
    };

    match fit.r_squared {
        None => moving_average(hourly_demand, config, FallbackReason::ConstantSeries),
        Some(r2) if r2 < config.min_r_squared => {
            moving_average(hourly_demand, config, FallbackReason::PoorFit { r_squared: r2 })
        }
        Some(r2) => {
            let start = hourly_demand.len();
            let next_period_demand = (start..start + config.forecast_horizon_hours)
                .map(|t| fit.predict(t as f64).max(0.0))
                .sum();
            DemandForecast::Trend {
                next_period_demand,
                slope: fit.slope,
                intercept: fit.intercept,
                r_squared: r2,
            }
        }
    }
}

fn moving_average(hourly_demand: &[f64], config: &AnalysisConfig, reason: FallbackReason) -> DemandForecast {
    let window = config.moving_average_window.min(hourly_demand.len());
    let recent = &hourly_demand[hourly_demand.len() - window..];
    DemandForecast::MovingAverage {
        next_period_demand: (stats::mean(recent) * config.forecast_horizon_hours as f64).max(0.0),
        window,
        reason,
    }
}

/// Hold out the last 20% of the history and score a trend fitted on the rest
pub fn evaluate_trend(hourly_demand: &[f64]) -> Option<ErrorMetrics> {
    let split = (hourly_demand.len() as f64 * TRAIN_SHARE) as usize;
    let (train, test) = hourly_demand.split_at(split);
    if test.is_empty() {
        return None;
    }
    let fit = stats::fit_linear_trend(train)?;
    let predicted: Vec<f64> = (split..hourly_demand.len())
        .map(|t| fit.predict(t as f64).max(0.0))
        .collect();
    stats::error_metrics(test, &predicted)
}
