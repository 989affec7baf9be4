//! REST handlers for the dashboard API
//!
//! Every handler reads from the shared, cached report.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::service::DashboardService;
use crate::demand::{DemandAnalysis, KeyMetrics};
use crate::error::AnalyticsError;
use crate::inventory::{CostAnalysis, InventoryPolicy, RestockItem, Urgency};
use crate::report::{DataQuality, Insight, Report, ZonePlanning};
use crate::zones::DeliveryZone;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct RestockingResponse {
    pub total: usize,
    pub items: Vec<RestockItem>,
}

#[derive(Serialize)]
pub struct InsightsResponse {
    pub insights: Vec<Insight>,
    pub data_quality: DataQuality,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn internal(e: AnalyticsError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!("Report failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct PolicyQuery {
    pub store: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct RestockQuery {
    pub min_urgency: Option<Urgency>,
    pub limit: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<DashboardService>;

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/v1/report
pub async fn get_report(State(service): State<AppState>) -> ApiResult<Report> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.as_ref().clone()))
}

/// GET /api/v1/key_metrics
pub async fn get_key_metrics(State(service): State<AppState>) -> ApiResult<KeyMetrics> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.key_metrics.clone()))
}

/// GET /api/v1/cost_analysis
pub async fn get_cost_analysis(State(service): State<AppState>) -> ApiResult<CostAnalysis> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.cost_analysis.clone()))
}

/// GET /api/v1/delivery_zones
pub async fn get_delivery_zones(State(service): State<AppState>) -> ApiResult<Vec<DeliveryZone>> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.delivery_zones.clone()))
}

/// GET /api/v1/delivery_zones/:store_id
pub async fn get_zone(State(service): State<AppState>, Path(store_id): Path<String>) -> ApiResult<DeliveryZone> {
    match service.get_zone(&store_id).await {
        Ok(Some(zone)) => Ok(Json(zone)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Store not found: {}", store_id),
            }),
        )),
        Err(e) => Err(internal(e)),
    }
}

/// GET /api/v1/zones/planning
pub async fn get_zone_planning(State(service): State<AppState>) -> ApiResult<ZonePlanning> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.zone_planning.clone()))
}

/// GET /api/v1/demand
pub async fn get_demand(State(service): State<AppState>) -> ApiResult<DemandAnalysis> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(report.demand.clone()))
}

/// GET /api/v1/inventory/policies?store=X&category=Y
pub async fn get_policies(
    State(service): State<AppState>,
    Query(params): Query<PolicyQuery>,
) -> ApiResult<Vec<InventoryPolicy>> {
    service
        .get_policies(params.store.as_deref(), params.category.as_deref())
        .await
        .map(Json)
        .map_err(internal)
}

/// GET /api/v1/inventory/restocking?min_urgency=High&limit=N
pub async fn get_restocking(
    State(service): State<AppState>,
    Query(params): Query<RestockQuery>,
) -> ApiResult<RestockingResponse> {
    let min_urgency = params.min_urgency.unwrap_or(Urgency::Medium);
    let limit = params.limit.unwrap_or(100);
    let items = service.get_restocking(min_urgency, limit).await.map_err(internal)?;
    Ok(Json(RestockingResponse {
        total: items.len(),
        items,
    }))
}

/// GET /api/v1/insights
pub async fn get_insights(State(service): State<AppState>) -> ApiResult<InsightsResponse> {
    let report = service.get_report().await.map_err(internal)?;
    Ok(Json(InsightsResponse {
        insights: report.insights.clone(),
        data_quality: report.data_quality.clone(),
    }))
}

/// POST /api/v1/refresh
pub async fn refresh(State(service): State<AppState>) -> impl IntoResponse {
    service.refresh().await;
    Json(serde_json::json!({"status": "refreshed"}))
}
