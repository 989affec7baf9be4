//! Delivery zone mapping
//!
//! A store's zone radius is the configured percentile of haversine distances
//! from the store to its delivered orders. Orders located outside the
//! configured bounding box are outliers: excluded from every distance figure
//! and counted on their own.

use crate::config::AnalysisConfig;
use crate::demand;
use crate::models::{DarkStore, GeoPoint, Transaction};
use crate::stats;
use geo::{Distance, Haversine};
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Mean Earth radius of the haversine measure
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
const METERS_PER_KM: f64 = 1000.0;

/// Pickup plus hand-over, added to every trip
const HANDLING_MINUTES: f64 = 3.0;
const SEARCH_MIN_KM: f64 = 0.1;
const SEARCH_MAX_KM: f64 = 10.0;
const SEARCH_ITERATIONS: usize = 20;

const SHRINK_ABOVE_MINUTES: f64 = 18.0;
const SHRINK_FACTOR: f64 = 0.85;
const EXPAND_BELOW_MINUTES: f64 = 10.0;
const EXPAND_MIN_FULFILLMENT: f64 = 0.9;
const EXPAND_FACTOR: f64 = 1.2;

/// Great-circle distance in kilometres
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(a.to_point(), b.to_point()) / METERS_PER_KM
}

pub fn circle_area_km2(radius_km: f64) -> f64 {
    PI * radius_km * radius_km
}

// ============================================================================
// Observed zones
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryZone {
    pub store_id: String,
    pub name: String,
    pub location: GeoPoint,
    /// Percentile distance of in-region orders
    pub radius_km: f64,
    pub estimated_coverage_area_km2: f64,
    /// In-region orders within `radius_km`
    pub order_count_in_zone: usize,
    /// In-region orders the radius is computed over
    pub orders_considered: usize,
    pub outliers_excluded: usize,
    pub avg_distance_km: f64,
    pub max_distance_km: f64,
    pub configured_radius_km: f64,
}

impl DeliveryZone {
    /// Observed radius, or the configured one for a store with no located orders
    pub fn effective_radius_km(&self) -> f64 {
        if self.orders_considered > 0 {
            self.radius_km
        } else {
            self.configured_radius_km
        }
    }
}

/// Zone of one store from its delivered-order locations
pub fn delivery_zone(store: &DarkStore, orders: &[GeoPoint], config: &AnalysisConfig) -> DeliveryZone {
    let (inside, outside): (Vec<&GeoPoint>, Vec<&GeoPoint>) =
        orders.iter().partition(|p| config.bounding_box.contains(p));

    let distances: Vec<f64> = inside.iter().map(|p| haversine_km(&store.location, p)).collect();
    let radius_km = stats::percentile(&distances, config.zone_percentile).unwrap_or(0.0);

    DeliveryZone {
        store_id: store.store_id.clone(),
        name: store.name.clone(),
        location: store.location,
        radius_km,
        estimated_coverage_area_km2: circle_area_km2(radius_km),
        order_count_in_zone: distances.iter().filter(|d| **d <= radius_km).count(),
        orders_considered: distances.len(),
        outliers_excluded: outside.len(),
        avg_distance_km: stats::mean(&distances),
        max_distance_km: distances.iter().copied().fold(0.0, f64::max),
        configured_radius_km: store.coverage_radius_km,
    }
}

/// One zone per store, using the located orders dispatched from it
pub fn map_zones(stores: &[DarkStore], transactions: &[Transaction], config: &AnalysisConfig) -> Vec<DeliveryZone> {
    let mut by_store: BTreeMap<&str, Vec<GeoPoint>> = BTreeMap::new();
    for tx in transactions {
        if let Some(location) = tx.customer_location {
            by_store.entry(tx.store_id.as_str()).or_default().push(location);
        }
    }

    stores
        .iter()
        .map(|store| {
            let orders = by_store.get(store.store_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let zone = delivery_zone(store, orders, config);
            if zone.outliers_excluded > 0 {
                tracing::debug!(
                    "{}: {} order locations outside the region",
                    store.store_id,
                    zone.outliers_excluded
                );
            }
            zone
        })
        .collect()
}

// ============================================================================
// Travel-time zones
// ============================================================================

/// Rider speed by hour of day
pub fn rider_speed_kmh(hour: u8) -> f64 {
    match hour {
        7..=9 | 17..=20 => 15.0,
        10..=16 => 25.0,
        _ => 35.0,
    }
}

pub fn travel_time_minutes(distance_km: f64, hour: u8) -> f64 {
    distance_km / rider_speed_kmh(hour) * 60.0 + HANDLING_MINUTES
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelTimeZone {
    pub hour: u8,
    pub radius_km: f64,
    pub estimated_delivery_minutes: f64,
    pub coverage_area_km2: f64,
}

/// Largest radius deliverable within `target_minutes` at `hour`
pub fn travel_time_zone(hour: u8, target_minutes: f64) -> TravelTimeZone {
    let (mut low, mut high) = (SEARCH_MIN_KM, SEARCH_MAX_KM);
    let mut best = SEARCH_MIN_KM;
    for _ in 0..SEARCH_ITERATIONS {
        let mid = (low + high) / 2.0;
        if travel_time_minutes(mid, hour) <= target_minutes {
            best = mid;
            low = mid;
        } else {
            high = mid;
        }
    }
    TravelTimeZone {
        hour,
        radius_km: best,
        estimated_delivery_minutes: travel_time_minutes(best, hour),
        coverage_area_km2: circle_area_km2(best),
    }
}

pub fn hourly_travel_zones(target_minutes: f64) -> Vec<TravelTimeZone> {
    (0..demand::HOURS_PER_DAY as u8)
        .map(|hour| travel_time_zone(hour, target_minutes))
        .collect()
}

// ============================================================================
// Overlap, traffic and adjustments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneOverlap {
    pub store_a: String,
    pub store_b: String,
    pub distance_km: f64,
    pub overlap_km: f64,
    /// Overlap as a share of the smaller radius, in percent
    pub overlap_pct: f64,
}

impl ZoneOverlap {
    pub fn overlaps(&self) -> bool {
        self.overlap_km > 0.0
    }
}

pub fn zone_overlaps(zones: &[DeliveryZone]) -> Vec<ZoneOverlap> {
    let mut overlaps = Vec::new();
    for (i, a) in zones.iter().enumerate() {
        for b in &zones[i + 1..] {
            let distance_km = haversine_km(&a.location, &b.location);
            let (ra, rb) = (a.effective_radius_km(), b.effective_radius_km());
            let overlap_km = (ra + rb - distance_km).max(0.0);
            let smaller = ra.min(rb);
            overlaps.push(ZoneOverlap {
                store_a: a.store_id.clone(),
                store_b: b.store_id.clone(),
                distance_km,
                overlap_km,
                overlap_pct: if smaller > 0.0 { overlap_km / smaller * 100.0 } else { 0.0 },
            });
        }
    }
    overlaps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrafficCondition {
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourTraffic {
    pub hour: u8,
    pub orders: usize,
    pub avg_delivery_minutes: f64,
    pub condition: TrafficCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficPatterns {
    pub hours: Vec<HourTraffic>,
    /// Mean of the hourly means
    pub avg_delivery_minutes: f64,
    pub heavy_hours: Vec<u8>,
}

/// Classify each hour with orders against the mean of hourly delivery times
pub fn traffic_patterns(transactions: &[Transaction]) -> TrafficPatterns {
    let mut by_hour: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
    for tx in transactions {
        by_hour.entry(tx.hour()).or_default().push(tx.delivery_time_minutes);
    }
    let hourly_means: Vec<(u8, usize, f64)> = by_hour
        .iter()
        .map(|(hour, times)| (*hour, times.len(), stats::mean(times)))
        .collect();
    let baseline = stats::mean(&hourly_means.iter().map(|(_, _, m)| *m).collect::<Vec<_>>());

    let hours: Vec<HourTraffic> = hourly_means
        .into_iter()
        .map(|(hour, orders, avg)| HourTraffic {
            hour,
            orders,
            avg_delivery_minutes: avg,
            condition: if avg > baseline * 1.2 {
                TrafficCondition::Heavy
            } else if avg > baseline * 0.8 {
                TrafficCondition::Moderate
            } else {
                TrafficCondition::Light
            },
        })
        .collect();
    let heavy_hours = hours
        .iter()
        .filter(|h| h.condition == TrafficCondition::Heavy)
        .map(|h| h.hour)
        .collect();

    TrafficPatterns {
        hours,
        avg_delivery_minutes: baseline,
        heavy_hours,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAction {
    Shrink,
    Expand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneAdjustment {
    pub store_id: String,
    pub action: ZoneAction,
    pub current_radius_km: f64,
    pub recommended_radius_km: f64,
    pub mean_delivery_minutes: f64,
    pub fulfillment_rate: f64,
}

/// Shrink slow zones, expand fast and reliable ones. Stores without orders are skipped.
pub fn zone_adjustments(zones: &[DeliveryZone], transactions: &[Transaction]) -> Vec<ZoneAdjustment> {
    let performance = demand::store_performance(transactions);
    zones
        .iter()
        .filter_map(|zone| {
            let perf = performance.get(&zone.store_id)?;
            let action = if perf.mean_delivery_minutes > SHRINK_ABOVE_MINUTES {
                ZoneAction::Shrink
            } else if perf.mean_delivery_minutes < EXPAND_BELOW_MINUTES
                && perf.fulfillment_rate > EXPAND_MIN_FULFILLMENT
            {
                ZoneAction::Expand
            } else {
                return None;
            };
            let current = zone.effective_radius_km();
            let factor = match action {
                ZoneAction::Shrink => SHRINK_FACTOR,
                ZoneAction::Expand => EXPAND_FACTOR,
            };
            Some(ZoneAdjustment {
                store_id: zone.store_id.clone(),
                action,
                current_radius_km: current,
                recommended_radius_km: current * factor,
                mean_delivery_minutes: perf.mean_delivery_minutes,
                fulfillment_rate: perf.fulfillment_rate,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneAnalysis {
    pub zones: Vec<DeliveryZone>,
    pub travel_time_zones: Vec<TravelTimeZone>,
    pub overlaps: Vec<ZoneOverlap>,
    pub traffic: TrafficPatterns,
    pub adjustments: Vec<ZoneAdjustment>,
}

pub fn analyze(stores: &[DarkStore], transactions: &[Transaction], config: &AnalysisConfig) -> ZoneAnalysis {
    let zones = map_zones(stores, transactions, config);
    ZoneAnalysis {
        travel_time_zones: hourly_travel_zones(config.target_delivery_minutes),
        overlaps: zone_overlaps(&zones),
        traffic: traffic_patterns(transactions),
        adjustments: zone_adjustments(&zones, transactions),
        zones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(id: &str, lat: f64, lon: f64) -> DarkStore {
        DarkStore {
            store_id: id.into(),
            name: crate::store_names::get_store_name(id),
            location: GeoPoint::new(lat, lon),
            coverage_radius_km: 3.0,
        }
    }

    #[test]
    fn haversine_known_distances() {
        let one_degree = haversine_km(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0));
        assert!((one_degree - 111.1949).abs() < 1e-3);
        let koramangala = GeoPoint::new(12.9716, 77.5946);
        let whitefield = GeoPoint::new(12.9698, 77.7500);
        assert!((haversine_km(&koramangala, &whitefield) - 16.84).abs() < 0.01);
        assert_eq!(haversine_km(&koramangala, &koramangala), 0.0);
        assert!((haversine_km(&whitefield, &koramangala) - haversine_km(&koramangala, &whitefield)).abs() < 1e-12);
    }

    #[test]
    fn order_on_region_edge_is_measured() {
        let s = store("DS001", 12.9716, 77.5946);
        let edge = GeoPoint::new(13.25, 77.5946);
        let zone = delivery_zone(&s, &[edge], &AnalysisConfig::default());
        assert_eq!(zone.orders_considered, 1);
        assert_eq!(zone.outliers_excluded, 0);
        assert!((zone.radius_km - haversine_km(&s.location, &edge)).abs() < 1e-9);
    }

    #[test]
    fn outliers_are_counted_not_measured() {
        let s = store("DS001", 12.9716, 77.5946);
        let orders = vec![
            GeoPoint::new(12.9800, 77.5946),
            GeoPoint::new(12.9650, 77.6000),
            GeoPoint::new(19.0760, 72.8777),
            GeoPoint::new(0.0, 0.0),
        ];
        let zone = delivery_zone(&s, &orders, &AnalysisConfig::default());
        assert_eq!(zone.orders_considered, 2);
        assert_eq!(zone.outliers_excluded, 2);
        assert!(zone.max_distance_km < 2.0);
        assert!(zone.radius_km <= zone.max_distance_km);
    }

    #[test]
    fn store_without_orders_has_empty_zone() {
        let s = store("DS003", 13.0067, 77.5664);
        let zone = delivery_zone(&s, &[], &AnalysisConfig::default());
        assert_eq!(zone.radius_km, 0.0);
        assert_eq!(zone.order_count_in_zone, 0);
        assert_eq!(zone.avg_distance_km, 0.0);
        assert_eq!(zone.effective_radius_km(), 3.0);
    }

    #[test]
    fn travel_time_radius_by_traffic_band() {
        // (12 - 3) minutes at 15 / 25 / 35 km/h
        assert!((travel_time_zone(8, 12.0).radius_km - 2.25).abs() < 1e-3);
        assert!((travel_time_zone(13, 12.0).radius_km - 3.75).abs() < 1e-3);
        assert!((travel_time_zone(23, 12.0).radius_km - 5.25).abs() < 1e-3);
        assert!(travel_time_zone(8, 12.0).estimated_delivery_minutes <= 12.0);
        assert_eq!(hourly_travel_zones(12.0).len(), 24);
    }

    #[test]
    fn nearby_stores_overlap() {
        let config = AnalysisConfig::default();
        // 0.02 degrees of latitude apart, about 2.22 km
        let zones: Vec<DeliveryZone> = [store("DS001", 12.9716, 77.5946), store("DS900", 12.9916, 77.5946)]
            .iter()
            .map(|s| delivery_zone(s, &[], &config))
            .collect();
        let overlaps = zone_overlaps(&zones);
        assert_eq!(overlaps.len(), 1);
        assert!(overlaps[0].overlaps());
        assert!((overlaps[0].distance_km - 2.224).abs() < 0.01);
        assert!((overlaps[0].overlap_km - (6.0 - overlaps[0].distance_km)).abs() < 1e-9);
        assert!(overlaps[0].overlap_pct > 100.0);

        let far = zone_overlaps(&[zones[0].clone(), delivery_zone(&store("DS002", 12.9698, 77.75), &[], &config)]);
        assert!(!far[0].overlaps());
        assert_eq!(far[0].overlap_pct, 0.0);
    }
}
