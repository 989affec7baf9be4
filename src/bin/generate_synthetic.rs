//! Synthetic data generator for dark-store analytics
//!
//! Writes transactions.csv, inventory.csv and dark_stores.csv for the
//! configured dark stores, with a diurnal demand curve, stock-outs and
//! customer locations scattered over each store's coverage area.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --days <N>              Days of orders (default: 7)
//!   --start <DATE>          First day, YYYY-MM-DD (default: 2024-03-04)
//!   --orders-per-hour <F>   Mean orders per store per average hour (default: 3.0)
//!   --stockout-rate <F>     Base probability of a short order (default: 0.08)
//!   --out-of-region <F>     Share of locations placed outside the metro (default: 0.01)
//!   --stores <N>            Use only the first N configured stores
//!   --seed <N>              Random seed (default: 42)
//!   --output <DIR>          Output directory (default: data)

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use dark_store_analytics::config::AnalysisConfig;
use dark_store_analytics::store_names::format_store;
use dark_store_analytics::synthetic::{self, SyntheticParams};
use std::path::PathBuf;

/// Synthetic data generator for the dark-store dataset
#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate a seeded synthetic dark-store dataset")]
struct Args {
    /// Days of orders to generate
    #[arg(long, default_value = "7")]
    days: usize,

    /// First day of the dataset
    #[arg(long, default_value = "2024-03-04")]
    start: NaiveDate,

    /// Mean orders per store in an average hour
    #[arg(long, default_value = "3.0")]
    orders_per_hour: f64,

    /// Base probability that an order is only partly fulfilled (0.0 - 1.0)
    #[arg(long, default_value = "0.08")]
    stockout_rate: f64,

    /// Share of customer locations placed outside the metro region (0.0 - 1.0)
    #[arg(long, default_value = "0.01")]
    out_of_region: f64,

    /// Use only the first N configured stores
    #[arg(long)]
    stores: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output directory
    #[arg(long, default_value = "data")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.stockout_rate) || !(0.0..=1.0).contains(&args.out_of_region) {
        bail!("--stockout-rate and --out-of-region must be within [0, 1]");
    }

    let config = AnalysisConfig::default().load_from_env();
    let mut stores = config.stores;
    if let Some(n) = args.stores {
        stores.truncate(n.max(1));
    }

    println!("🔧 Synthetic Data Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Output:           {}", args.output.display());
    println!("Days:             {} from {}", args.days, args.start);
    println!("Orders/hour:      {:.1} per store", args.orders_per_hour);
    println!("Stock-out rate:   {:.1}%", args.stockout_rate * 100.0);
    println!("Out of region:    {:.1}%", args.out_of_region * 100.0);
    println!("Random seed:      {}", args.seed);
    println!("Stores:");
    for store in &stores {
        println!("   {}", format_store(&store.store_id));
    }
    println!();

    let params = SyntheticParams {
        start: args.start,
        days: args.days,
        orders_per_hour: args.orders_per_hour,
        stockout_rate: args.stockout_rate,
        out_of_region_rate: args.out_of_region,
        ..SyntheticParams::new(stores)
    };

    println!("🏭 Generating synthetic data...");
    let data = synthetic::generate(&params, args.seed);
    data.write_dir(&args.output)?;

    let short = data
        .transactions
        .iter()
        .filter(|t| t.quantity_fulfilled < t.quantity_ordered)
        .count();

    println!();
    println!("✅ Done");
    println!("   Transactions:   {}", data.transactions.len());
    println!(
        "   Short orders:   {} ({:.1}%)",
        short,
        short as f64 / data.transactions.len().max(1) as f64 * 100.0
    );
    println!("   Inventory rows: {}", data.inventory.len());
    println!("   Dark stores:    {}", data.stores.len());

    Ok(())
}
