//! Seeded synthetic dataset for demos and tests
//!
//! Orders follow a diurnal curve with morning and evening peaks, categories
//! are drawn by weight, stock-outs are likelier at peak hours, and customer
//! locations are scattered uniformly over each store's coverage disk. A small
//! share of locations is deliberately placed outside the metro region.

use crate::error::Result;
use crate::loader::{DARK_STORES_FILE, INVENTORY_FILE, TRANSACTIONS_FILE};
use crate::models::{DarkStore, DarkStoreCsvRecord, GeoPoint, InventoryItem, TransactionCsvRecord, TIMESTAMP_FORMAT};
use crate::zones::EARTH_RADIUS_KM;
use chrono::{Duration, NaiveDate};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

const KM_PER_DEGREE_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Relative order volume by hour of day
const HOURLY_WEIGHTS: [f64; 24] = [
    0.2, 0.1, 0.1, 0.1, 0.1, 0.2, 0.5, 1.2, 1.6, 1.3, 0.9, 0.8, //
    1.0, 0.9, 0.7, 0.7, 0.9, 1.4, 1.8, 2.0, 1.7, 1.1, 0.7, 0.4,
];

/// (category, weight, supplier lead time in hours, unit cost, products)
const CATEGORY_PROFILES: [(&str, u32, f64, f64, [&str; 3]); 8] = [
    ("Beverages", 14, 24.0, 1.8, ["Cola 750ml", "Orange Juice 1L", "Mineral Water 1L"]),
    ("Dairy", 18, 12.0, 2.5, ["Milk 500ml", "Curd 400g", "Paneer 200g"]),
    ("Frozen Foods", 6, 36.0, 4.0, ["Frozen Peas 500g", "Ice Cream 700ml", "Frozen Parathas"]),
    ("Fruits & Vegetables", 20, 12.0, 1.2, ["Bananas 1kg", "Onions 1kg", "Tomatoes 500g"]),
    ("Household", 7, 48.0, 3.0, ["Dish Soap", "Detergent 1kg", "Garbage Bags"]),
    ("Personal Care", 6, 48.0, 3.5, ["Toothpaste", "Shampoo 180ml", "Hand Wash"]),
    ("Snacks", 16, 24.0, 1.5, ["Potato Chips", "Cookies", "Namkeen 200g"]),
    ("Staples", 13, 36.0, 2.0, ["Rice 5kg", "Atta 5kg", "Toor Dal 1kg"]),
];

/// Shape of the generated dataset
#[derive(Debug, Clone)]
pub struct SyntheticParams {
    pub start: NaiveDate,
    pub days: usize,
    /// Mean orders per store in an average hour
    pub orders_per_hour: f64,
    pub stockout_rate: f64,
    pub out_of_region_rate: f64,
    pub stores: Vec<DarkStore>,
}

impl SyntheticParams {
    pub fn new(stores: Vec<DarkStore>) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or(NaiveDate::MIN),
            days: 7,
            orders_per_hour: 3.0,
            stockout_rate: 0.08,
            out_of_region_rate: 0.01,
            stores,
        }
    }

    pub fn categories() -> Vec<String> {
        CATEGORY_PROFILES.iter().map(|p| p.0.to_string()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticData {
    pub transactions: Vec<TransactionCsvRecord>,
    pub inventory: Vec<InventoryItem>,
    pub stores: Vec<DarkStoreCsvRecord>,
}

/// Same params and seed, same dataset
pub fn generate(params: &SyntheticParams, seed: u64) -> SyntheticData {
    let mut rng = StdRng::seed_from_u64(seed);
    let category_dist = match WeightedIndex::new(CATEGORY_PROFILES.iter().map(|p| p.1)) {
        Ok(dist) => dist,
        Err(_) => return SyntheticData::default(),
    };
    let mean_weight = HOURLY_WEIGHTS.iter().sum::<f64>() / HOURLY_WEIGHTS.len() as f64;

    let mut transactions = Vec::new();
    for day in 0..params.days {
        let date = params.start + Duration::days(day as i64);
        for store in &params.stores {
            for (hour, weight) in HOURLY_WEIGHTS.iter().enumerate() {
                let peak = weight / mean_weight;
                let expected = params.orders_per_hour * peak;
                let orders = (expected + rng.gen_range(-0.5..0.5f64) * expected).round().max(0.0) as usize;
                for _ in 0..orders {
                    let (category, ..) = CATEGORY_PROFILES[category_dist.sample(&mut rng)];
                    transactions.push(order(&mut rng, params, store, date, hour as u32, peak, category));
                }
            }
        }
    }

    let mut inventory = Vec::new();
    for store in &params.stores {
        for (category, _, lead_time_hours, unit_cost, products) in CATEGORY_PROFILES.iter() {
            for product in products {
                inventory.push(InventoryItem {
                    store_id: store.store_id.clone(),
                    product_name: product.to_string(),
                    category: category.to_string(),
                    current_stock: rng.gen_range(0..60) as f64,
                    lead_time_hours: Some(*lead_time_hours),
                    storage_cost_per_unit: Some(*unit_cost),
                    supplier_reliability: Some((rng.gen_range(0.80..0.99f64) * 100.0).round() / 100.0),
                });
            }
        }
    }

    let stores = params
        .stores
        .iter()
        .map(|s| DarkStoreCsvRecord {
            store_id: s.store_id.clone(),
            name: Some(s.name.clone()),
            lat: s.location.lat,
            lon: s.location.lon,
            coverage_radius_km: Some(s.coverage_radius_km),
        })
        .collect();

    SyntheticData {
        transactions,
        inventory,
        stores,
    }
}

fn order(
    rng: &mut StdRng,
    params: &SyntheticParams,
    store: &DarkStore,
    date: NaiveDate,
    hour: u32,
    peak: f64,
    category: &str,
) -> TransactionCsvRecord {
    let timestamp = date
        .and_hms_opt(hour, rng.gen_range(0..60), rng.gen_range(0..60))
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();

    let quantity_ordered: i64 = rng.gen_range(1..=5);
    let stockout_chance = (params.stockout_rate * peak.max(0.5)).min(0.9);
    let quantity_fulfilled = if rng.gen_bool(stockout_chance) {
        rng.gen_range(0..quantity_ordered)
    } else {
        quantity_ordered
    };

    // Sum of uniforms: roughly bell-shaped noise
    let noise: f64 = (0..3).map(|_| rng.gen_range(-1.5..1.5f64)).sum();
    let delivery_time_minutes = ((7.0 + 2.5 * peak + noise).max(4.0) * 10.0).round() / 10.0;

    let shortfall_penalty = (quantity_ordered - quantity_fulfilled) as f64 * 0.4;
    let lateness_penalty = ((delivery_time_minutes - 10.0) * 0.15).max(0.0);
    let csat = (4.8 - shortfall_penalty - lateness_penalty + rng.gen_range(-0.3..0.3f64)).clamp(1.0, 5.0);

    let location = if rng.gen_bool(params.out_of_region_rate) {
        // Far outside the metro region
        GeoPoint::new(store.location.lat + rng.gen_range(1.0..3.0f64), store.location.lon - rng.gen_range(1.0..3.0f64))
    } else {
        point_in_disk(rng, &store.location, store.coverage_radius_km)
    };

    TransactionCsvRecord {
        timestamp,
        dark_store_id: store.store_id.clone(),
        category: category.to_string(),
        quantity_ordered,
        quantity_fulfilled,
        delivery_time_minutes,
        csat_score: (csat * 10.0).round() / 10.0,
        customer_lat: Some(location.lat),
        customer_lon: Some(location.lon),
    }
}

/// Uniform point within `radius_km` of `center`
pub fn point_in_disk(rng: &mut impl Rng, center: &GeoPoint, radius_km: f64) -> GeoPoint {
    let r = radius_km * rng.gen::<f64>().sqrt();
    let theta = rng.gen_range(0.0..std::f64::consts::TAU);
    let d_lat = r * theta.cos() / KM_PER_DEGREE_LAT;
    let d_lon = r * theta.sin() / (KM_PER_DEGREE_LAT * center.lat.to_radians().cos());
    GeoPoint::new(center.lat + d_lat, center.lon + d_lon)
}

impl SyntheticData {
    /// Write the three CSV files the loader reads
    pub fn write_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_csv(&dir.join(TRANSACTIONS_FILE), &self.transactions)?;
        write_csv(&dir.join(INVENTORY_FILE), &self.inventory)?;
        write_csv(&dir.join(DARK_STORES_FILE), &self.stores)?;
        info!(
            "Wrote {} transactions, {} inventory rows, {} stores to {}",
            self.transactions.len(),
            self.inventory.len(),
            self.stores.len(),
            dir.display()
        );
        Ok(())
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
