//! Dark-store analytics for quick-commerce operations
//!
//! Loads order, inventory and store data from CSV, then derives demand
//! summaries, inventory policies with explicit fallbacks, delivery zones, and
//! a sectioned report served to the CLI and the dashboard API.

pub mod api;
pub mod config;
pub mod demand;
pub mod error;
pub mod forecast;
pub mod inventory;
pub mod loader;
pub mod models;
pub mod report;
pub mod stats;
pub mod store_names;
pub mod synthetic;
pub mod zones;

pub use config::AnalysisConfig;
pub use error::{AnalyticsError, Result};
pub use loader::Dataset;
pub use report::{run_pipeline, Report};
