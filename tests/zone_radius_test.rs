//! Zone radius recovery from uniformly scattered orders

use dark_store_analytics::config::AnalysisConfig;
use dark_store_analytics::models::{DarkStore, GeoPoint};
use dark_store_analytics::synthetic::point_in_disk;
use dark_store_analytics::zones::{delivery_zone, haversine_km};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn store(radius_km: f64) -> DarkStore {
    DarkStore {
        store_id: "DS001".to_string(),
        name: "Koramangala".to_string(),
        location: GeoPoint::new(12.9716, 77.5946),
        coverage_radius_km: radius_km,
    }
}

fn uniform_orders(center: &GeoPoint, radius_km: f64, n: usize, seed: u64) -> Vec<GeoPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| point_in_disk(&mut rng, center, radius_km)).collect()
}

#[test]
fn percentile_radius_recovers_true_radius() {
    let config = AnalysisConfig::default();
    for (radius, seed) in [(1.5, 1), (3.0, 2), (5.0, 3)] {
        let store = store(radius);
        let orders = uniform_orders(&store.location, radius, 5_000, seed);
        let zone = delivery_zone(&store, &orders, &config);

        // Uniform over a disk: P(d <= r) = (r / R)^2
        let expected = radius * config.zone_percentile.sqrt();
        assert!(
            (zone.radius_km - expected).abs() / expected < 0.02,
            "R={} got {} expected {}",
            radius,
            zone.radius_km,
            expected
        );
        assert!((zone.radius_km - radius).abs() / radius < 0.05);
        assert!(zone.max_distance_km <= radius * 1.01);
        assert_eq!(zone.outliers_excluded, 0);
    }
}

#[test]
fn full_percentile_matches_max_distance() {
    let config = AnalysisConfig {
        zone_percentile: 1.0,
        ..AnalysisConfig::default()
    };
    let store = store(2.0);
    let orders = uniform_orders(&store.location, 2.0, 2_000, 9);
    let zone = delivery_zone(&store, &orders, &config);

    assert!((zone.radius_km - zone.max_distance_km).abs() < 1e-9);
    assert_eq!(zone.order_count_in_zone, zone.orders_considered);
}

#[test]
fn out_of_region_points_do_not_stretch_the_radius() {
    let config = AnalysisConfig::default();
    let store = store(3.0);
    let mut orders = uniform_orders(&store.location, 3.0, 2_000, 4);
    let clean = delivery_zone(&store, &orders, &config);

    let far = GeoPoint::new(store.location.lat + 2.0, store.location.lon - 2.0);
    assert!(haversine_km(&store.location, &far) > 100.0);
    orders.extend(std::iter::repeat(far).take(200));

    let zone = delivery_zone(&store, &orders, &config);
    assert_eq!(zone.outliers_excluded, 200);
    assert_eq!(zone.radius_km, clean.radius_km);
}
