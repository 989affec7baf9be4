//! Shared report access for the dashboard API
//!
//! The report is computed on first request and cached until refreshed.

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::inventory::{InventoryPolicy, RestockItem, Urgency};
use crate::loader::Dataset;
use crate::report::{run_pipeline, Report};
use crate::zones::DeliveryZone;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Where the report's input comes from
#[derive(Debug, Clone)]
pub enum ReportSource {
    /// Re-read from disk on every refresh
    Directory(PathBuf),
    /// Already loaded, e.g. generated in-process
    Loaded(Arc<Dataset>),
}

pub struct DashboardService {
    source: ReportSource,
    config: AnalysisConfig,
    cached_report: Arc<RwLock<Option<Arc<Report>>>>,
}

fn compute_report(source: &ReportSource, config: &AnalysisConfig) -> Result<Report> {
    match source {
        ReportSource::Directory(dir) => {
            let dataset = Dataset::load_dir(dir, config)?;
            run_pipeline(&dataset, config)
        }
        ReportSource::Loaded(dataset) => run_pipeline(dataset, config),
    }
}

impl DashboardService {
    pub fn new(data_dir: impl Into<PathBuf>, config: AnalysisConfig) -> Self {
        Self::with_source(ReportSource::Directory(data_dir.into()), config)
    }

    pub fn from_dataset(dataset: Dataset, config: AnalysisConfig) -> Self {
        Self::with_source(ReportSource::Loaded(Arc::new(dataset)), config)
    }

    fn with_source(source: ReportSource, config: AnalysisConfig) -> Self {
        Self {
            source,
            config,
            cached_report: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get_report(&self) -> Result<Arc<Report>> {
        // Check cache first
        {
            let cache = self.cached_report.read().await;
            if let Some(report) = cache.as_ref() {
                return Ok(report.clone());
            }
        }

        let mut cache = self.cached_report.write().await;
        // Another request may have filled it while we waited
        if let Some(report) = cache.as_ref() {
            return Ok(report.clone());
        }

        // File reads and the pipeline are blocking work
        let source = self.source.clone();
        let config = self.config.clone();
        let report = Arc::new(tokio::task::spawn_blocking(move || compute_report(&source, &config)).await??);
        info!("Report computed: {} insights", report.insights.len());

        *cache = Some(report.clone());
        Ok(report)
    }

    /// Drop the cached report so the next request recomputes it
    pub async fn refresh(&self) {
        let mut cache = self.cached_report.write().await;
        *cache = None;
    }

    pub async fn get_zone(&self, store_id: &str) -> Result<Option<DeliveryZone>> {
        let report = self.get_report().await?;
        Ok(report.delivery_zones.iter().find(|z| z.store_id == store_id).cloned())
    }

    pub async fn get_policies(&self, store_id: Option<&str>, category: Option<&str>) -> Result<Vec<InventoryPolicy>> {
        let report = self.get_report().await?;
        Ok(report
            .inventory
            .policies
            .iter()
            .filter(|p| store_id.map_or(true, |s| p.store_id == s))
            .filter(|p| category.map_or(true, |c| p.category == c))
            .cloned()
            .collect())
    }

    /// Restock items at or above `min_urgency`, most urgent first
    pub async fn get_restocking(&self, min_urgency: Urgency, limit: usize) -> Result<Vec<RestockItem>> {
        let report = self.get_report().await?;
        Ok(report
            .inventory
            .restocking
            .iter()
            .filter(|r| r.urgency >= min_urgency)
            .take(limit)
            .cloned()
            .collect())
    }
}
