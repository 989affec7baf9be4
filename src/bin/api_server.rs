//! Dashboard API server for dark-store analytics
//!
//! Serves the analytics report as read-only JSON. The report is computed on the
//! first request and cached until POST /api/v1/refresh.
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT          Port to listen on (default: 8080)
//!   --data-dir PATH      Directory with transactions.csv etc. (default: data)
//!   --config PATH        TOML analysis config
//!   --synthetic-seed N   Serve a generated 7-day dataset instead of reading files
//!
//! REST endpoints:
//!   GET  /api/v1/health                      - Health check
//!   GET  /api/v1/report                      - Full report
//!   GET  /api/v1/key_metrics                 - KPI section
//!   GET  /api/v1/cost_analysis               - Inventory cost section
//!   GET  /api/v1/delivery_zones              - Zones for every store
//!   GET  /api/v1/delivery_zones/:store_id    - One store's zone
//!   GET  /api/v1/zones/planning              - Travel-time zones, overlaps, traffic
//!   GET  /api/v1/demand                      - Demand analysis
//!   GET  /api/v1/insights                    - Insights and data quality
//!   GET  /api/v1/inventory/policies          - Policies (?store=&category=)
//!   GET  /api/v1/inventory/restocking        - Restocking (?min_urgency=&limit=)
//!   POST /api/v1/refresh                     - Drop the cached report

use anyhow::Result;
use clap::Parser;
use dark_store_analytics::api::{create_router, DashboardService};
use dark_store_analytics::config::AnalysisConfig;
use dark_store_analytics::loader::Dataset;
use dark_store_analytics::synthetic::{self, SyntheticParams};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Read-only JSON dashboard API for dark-store analytics")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Directory with transactions.csv, inventory.csv and dark_stores.csv
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// TOML analysis config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve a generated dataset with this seed instead of reading files
    #[arg(long)]
    synthetic_seed: Option<u64>,
}

fn print_banner(port: u16, source: &str) {
    println!("============================================================");
    println!("         DARK STORE ANALYTICS DASHBOARD API");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  REST:     http://localhost:{}/api/v1/", port);
    println!("  Data:     {}", source);
    println!();
    println!("REST Endpoints:");
    println!("  GET  /api/v1/health                Health check");
    println!("  GET  /api/v1/report                Full report");
    println!("  GET  /api/v1/key_metrics           KPIs");
    println!("  GET  /api/v1/cost_analysis         Inventory costs");
    println!("  GET  /api/v1/delivery_zones        All zones");
    println!("  GET  /api/v1/delivery_zones/:id    Store zone");
    println!("  GET  /api/v1/zones/planning        Zone planning");
    println!("  GET  /api/v1/demand                Demand analysis");
    println!("  GET  /api/v1/insights              Insights");
    println!("  GET  /api/v1/inventory/policies    Policies");
    println!("  GET  /api/v1/inventory/restocking  Restocking");
    println!("  POST /api/v1/refresh               Recompute");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();

    let mut config = AnalysisConfig::default();
    if let Some(path) = &args.config {
        config = config.load_from_file(path)?;
    }
    let config = config.load_from_env();
    config.validate()?;

    let (service, source) = match args.synthetic_seed {
        Some(seed) => {
            let params = SyntheticParams::new(config.stores.clone());
            let generated = synthetic::generate(&params, seed);
            let dir = tempdir_for(seed)?;
            generated.write_dir(&dir)?;
            let dataset = Dataset::load_dir(&dir, &config)?;
            (
                DashboardService::from_dataset(dataset, config),
                format!("synthetic (seed {})", seed),
            )
        }
        None => {
            let source = args.data_dir.display().to_string();
            (DashboardService::new(args.data_dir, config), source)
        }
    };

    print_banner(args.port, &source);

    let app = create_router(Arc::new(service));
    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn tempdir_for(seed: u64) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("dark_store_synthetic_{}", seed));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
