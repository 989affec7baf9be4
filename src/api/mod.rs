//! Read-only JSON dashboard API over the analytics report

pub mod handlers;
pub mod service;

pub use service::DashboardService;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(service: Arc<DashboardService>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/v1/health", get(handlers::health))
        // Report sections
        .route("/api/v1/report", get(handlers::get_report))
        .route("/api/v1/key_metrics", get(handlers::get_key_metrics))
        .route("/api/v1/cost_analysis", get(handlers::get_cost_analysis))
        .route("/api/v1/delivery_zones", get(handlers::get_delivery_zones))
        .route("/api/v1/delivery_zones/:store_id", get(handlers::get_zone))
        .route("/api/v1/zones/planning", get(handlers::get_zone_planning))
        .route("/api/v1/demand", get(handlers::get_demand))
        .route("/api/v1/insights", get(handlers::get_insights))
        // Inventory
        .route("/api/v1/inventory/policies", get(handlers::get_policies))
        .route("/api/v1/inventory/restocking", get(handlers::get_restocking))
        // Cache
        .route("/api/v1/refresh", post(handlers::refresh))
        // State and middleware
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
