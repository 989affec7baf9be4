//! Dark-store analytics report
//!
//! Loads a data directory, runs demand aggregation, inventory forecasting and
//! zone mapping, then prints a sectioned console report or the JSON report.
//!
//! Run: ./target/release/dark_store_analytics [OPTIONS]
//! Sections: all, kpi, demand, inventory, zones

use anyhow::Result;
use clap::{Parser, ValueEnum};
use dark_store_analytics::config::{AnalysisConfig, CliOverrides};
use dark_store_analytics::forecast::{DemandForecast, SafetyStock};
use dark_store_analytics::inventory::Urgency;
use dark_store_analytics::loader::Dataset;
use dark_store_analytics::report::{run_pipeline, Report};
use dark_store_analytics::store_names::format_store;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    All,
    Kpi,
    Demand,
    Inventory,
    Zones,
}

#[derive(Parser, Debug)]
#[command(name = "dark_store_analytics")]
#[command(about = "Demand, inventory and delivery-zone analytics for dark stores")]
struct Args {
    /// Directory with transactions.csv, inventory.csv and dark_stores.csv
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// TOML analysis config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target service level, e.g. 0.95
    #[arg(long)]
    service_level: Option<f64>,

    /// Default supplier lead time in days
    #[arg(long)]
    lead_time_days: Option<f64>,

    /// Peak detection multiple of the overall mean
    #[arg(long)]
    peak_multiplier: Option<f64>,

    /// Percentile of order distances enclosed by a zone, e.g. 0.95
    #[arg(long)]
    zone_percentile: Option<f64>,

    /// Report section to print
    #[arg(long, value_enum, default_value = "all")]
    section: Section,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AnalysisConfig::default();
    if let Some(path) = &args.config {
        config = config.load_from_file(path)?;
        info!("Loaded config from {}", path.display());
    }
    let config = config.load_from_env().apply_cli(&CliOverrides {
        service_level: args.service_level,
        lead_time_days: args.lead_time_days,
        peak_multiplier: args.peak_multiplier,
        zone_percentile: args.zone_percentile,
    });
    config.validate()?;

    let dataset = Dataset::load_dir(&args.data_dir, &config)?;
    let report = run_pipeline(&dataset, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "█".repeat(80));
    println!("{}  DARK STORE ANALYTICS  {}", "█".repeat(28), "█".repeat(28));
    println!("{}\n", "█".repeat(80));

    match args.section {
        Section::All => {
            print_kpis(&report);
            print_demand(&report);
            print_inventory(&report);
            print_zones(&report);
            print_insights(&report);
        }
        Section::Kpi => print_kpis(&report),
        Section::Demand => print_demand(&report),
        Section::Inventory => print_inventory(&report),
        Section::Zones => print_zones(&report),
    }

    println!("\n{}", "█".repeat(80));
    Ok(())
}

fn print_kpis(report: &Report) {
    print_section_header("1. KEY METRICS");

    let m = &report.key_metrics;
    println!("  Orders:               {:>12}", m.orders);
    println!("  Units Ordered:        {:>12.0}", m.units_ordered);
    println!("  Units Fulfilled:      {:>12.0}", m.units_fulfilled);
    println!("  Fulfillment Rate:     {:>11.1}%", m.fulfillment_rate * 100.0);
    println!("  Out-of-Stock Rate:    {:>11.1}%", m.out_of_stock_rate * 100.0);
    println!("  Avg Delivery Time:    {:>8.1} min", m.avg_delivery_time);
    println!("  Avg CSAT:             {:>12.2}", m.avg_csat_score);
    println!("  Cancellation Rate:    {:>11.1}%", m.cancellation_rate * 100.0);
    println!("  CSAT below 3:         {:>11.1}%", m.csat_below_3_share * 100.0);

    let q = &report.data_quality;
    if q.rows_skipped > 0 || q.outlier_locations > 0 {
        print_subsection("Data Quality");
        for file in &q.files {
            println!("  {:20} {:>8} read {:>6} skipped", file.file, file.rows_read, file.rows_skipped);
            for (reason, count) in &file.reasons {
                println!("      {:28} {:>6}", reason, count);
            }
        }
        println!("  Out-of-region order locations: {}", q.outlier_locations);
    }
}

fn print_demand(report: &Report) {
    print_section_header("2. DEMAND PATTERNS");

    let demand = &report.demand;
    println!("  Observed days: {}", demand.span.days);

    print_subsection("Peak Hours (units ordered)");
    for h in &demand.peak_hours {
        println!("  {:02}:00  {:>10.0}", h.hour, h.total_demand);
    }

    let flagged: Vec<String> = demand
        .hourly_profile
        .iter()
        .filter(|s| s.peak_flag)
        .filter_map(|s| s.key.hour_of_day.map(|h| format!("{:02}:00", h)))
        .collect();
    if !flagged.is_empty() {
        println!("\n  Peak-flagged hours: {}", flagged.join(", "));
    }

    print_subsection("Category Performance");
    println!(
        "  {:22} {:>8} {:>10} {:>10} {:>10} {:>8}",
        "Category", "Orders", "Units", "Fulfill%", "Delivery", "CSAT"
    );
    println!("  {}", "─".repeat(72));
    for (category, p) in &demand.categories {
        println!(
            "  {:22} {:>8} {:>10.0} {:>9.1}% {:>10.1} {:>8.2}",
            category,
            p.orders,
            p.units_ordered,
            p.fulfillment_rate * 100.0,
            p.mean_delivery_minutes,
            p.mean_csat
        );
    }

    print_subsection("Store Performance");
    for (store_id, p) in &demand.stores {
        println!(
            "  {:28} {:>8} orders {:>9.1}% fulfilled {:>7.1} min",
            format_store(store_id),
            p.orders,
            p.fulfillment_rate * 100.0,
            p.mean_delivery_minutes
        );
    }

    if !demand.bottlenecks.is_empty() {
        print_subsection("Bottlenecks (top 10)");
        for b in demand.bottlenecks.iter().take(10) {
            println!("  {:02}:00  {:22} {:?} ({:.2})", b.hour, b.category, b.kind, b.value);
        }
    }
}

fn print_inventory(report: &Report) {
    print_section_header("3. INVENTORY POLICIES");

    let inv = &report.inventory;
    println!(
        "  Policies: {}   safety-stock fallbacks: {}   forecast fallbacks: {}",
        inv.policies.len(),
        inv.safety_stock_fallbacks,
        inv.forecast_fallbacks
    );

    print_subsection("Policies");
    println!(
        "  {:6} {:20} {:>8} {:>8} {:>8} {:>8} {:>10}  {}",
        "Store", "Category", "Stock", "Safety", "ROP", "EOQ", "Forecast", "Method"
    );
    println!("  {}", "─".repeat(86));
    for p in &inv.policies {
        let ss_method = match p.safety_stock {
            SafetyStock::Statistical { .. } => "stat",
            SafetyStock::FallbackMargin { .. } => "margin",
        };
        let fc_method = match p.forecast {
            DemandForecast::Trend { .. } => "trend",
            DemandForecast::MovingAverage { .. } => "moving-avg",
        };
        println!(
            "  {:6} {:20} {:>8.0} {:>8.1} {:>8.1} {:>8.1} {:>10.1}  {}/{}",
            p.store_id,
            p.category,
            p.current_stock,
            p.safety_stock.value(),
            p.reorder_point,
            p.reorder_quantity,
            p.forecast.next_period_demand(),
            ss_method,
            fc_method
        );
    }

    print_subsection("Restocking (Critical and High)");
    for r in inv.restocking.iter().filter(|r| r.urgency >= Urgency::High) {
        let reliability = r
            .supplier_reliability
            .map_or_else(|| "n/a".to_string(), |v| format!("{:.0}%", v * 100.0));
        println!(
            "  {:?} {:28} {:20} stock {:>6.0} projected {:>7.1} order {:>7.1}  lead {:>5.1}h  supplier {}",
            r.urgency,
            format_store(&r.store_id),
            r.category,
            r.current_stock,
            r.projected_stock,
            r.suggested_order_qty,
            r.lead_time_hours,
            reliability
        );
    }

    print_subsection("Daily Inventory Cost");
    let c = &report.cost_analysis;
    println!("  Holding:   {:>10.2}", c.total_holding_cost_daily);
    println!("  Stock-out: {:>10.2}", c.total_stockout_cost_daily);
    println!("  Total:     {:>10.2}", c.total_inventory_cost_daily);
    for (category, cost) in &c.cost_by_category {
        println!("    {:22} {:>10.2}", category, cost);
    }
}

fn print_zones(report: &Report) {
    print_section_header("4. DELIVERY ZONES");

    println!(
        "  {:28} {:>8} {:>10} {:>8} {:>8} {:>8} {:>8}",
        "Store", "Radius", "Area km²", "Orders", "InZone", "Avg km", "Outliers"
    );
    println!("  {}", "─".repeat(86));
    for z in &report.delivery_zones {
        println!(
            "  {:28} {:>8.2} {:>10.2} {:>8} {:>8} {:>8.2} {:>8}",
            format_store(&z.store_id),
            z.radius_km,
            z.estimated_coverage_area_km2,
            z.orders_considered,
            z.order_count_in_zone,
            z.avg_distance_km,
            z.outliers_excluded
        );
    }

    let planning = &report.zone_planning;
    print_subsection("Travel-Time Radius by Hour");
    for z in planning.travel_time_zones.iter().step_by(3) {
        println!("  {:02}:00  {:>5.2} km  {:>5.1} min", z.hour, z.radius_km, z.estimated_delivery_minutes);
    }

    if !planning.traffic.heavy_hours.is_empty() {
        println!("\n  Heavy traffic hours: {:?}", planning.traffic.heavy_hours);
    }

    let overlapping: Vec<_> = planning.overlaps.iter().filter(|o| o.overlaps()).collect();
    if !overlapping.is_empty() {
        print_subsection("Zone Overlaps");
        for o in overlapping {
            println!("  {} / {}  {:.2} km apart, {:.1}% overlap", o.store_a, o.store_b, o.distance_km, o.overlap_pct);
        }
    }

    if !planning.adjustments.is_empty() {
        print_subsection("Zone Adjustments");
        for a in &planning.adjustments {
            println!(
                "  {:28} {:?} {:.2} -> {:.2} km ({:.1} min avg)",
                format_store(&a.store_id),
                a.action,
                a.current_radius_km,
                a.recommended_radius_km,
                a.mean_delivery_minutes
            );
        }
    }
}

fn print_insights(report: &Report) {
    print_section_header("5. INSIGHTS");
    for i in &report.insights {
        println!("  [{:?}] {}: {}", i.kind, i.area, i.message);
        println!("      -> {}", i.recommendation);
    }
}
