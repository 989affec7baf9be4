//! Dashboard API over an in-memory synthetic dataset

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use dark_store_analytics::api::{create_router, DashboardService};
use dark_store_analytics::config::AnalysisConfig;
use dark_store_analytics::loader::Dataset;
use dark_store_analytics::synthetic::{self, SyntheticParams};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> Router {
    let config = AnalysisConfig::default();
    let dir = TempDir::new().expect("tempdir");
    synthetic::generate(&SyntheticParams::new(config.stores.clone()), 42)
        .write_dir(dir.path())
        .expect("write dataset");
    let dataset = Dataset::load_dir(dir.path(), &config).expect("load");
    create_router(Arc::new(DashboardService::from_dataset(dataset, config)))
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(app(), "GET", "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn report_has_the_three_named_sections() {
    let (status, body) = send(app(), "GET", "/api/v1/report").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["key_metrics"].is_object());
    assert!(body["cost_analysis"].is_object());
    assert_eq!(body["delivery_zones"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn key_metrics_carry_out_of_stock_rate() {
    let (status, body) = send(app(), "GET", "/api/v1/key_metrics").await;
    assert_eq!(status, StatusCode::OK);
    let rate = body["out_of_stock_rate"].as_f64().expect("rate");
    assert!((0.0..1.0).contains(&rate));
    assert!(body["orders"].as_u64().expect("orders") > 0);
}

#[tokio::test]
async fn zone_lookup_by_store() {
    let app = app();
    let (status, body) = send(app.clone(), "GET", "/api/v1/delivery_zones/DS003").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_id"], "DS003");
    assert!(body["radius_km"].as_f64().expect("radius") > 0.0);

    let (status, body) = send(app, "GET", "/api/v1/delivery_zones/DS999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Store not found: DS999");
}

#[tokio::test]
async fn policies_filter_by_store_and_category() {
    let (status, body) = send(app(), "GET", "/api/v1/inventory/policies?store=DS001&category=Dairy").await;
    assert_eq!(status, StatusCode::OK);
    let policies = body.as_array().expect("array");
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0]["store_id"], "DS001");
    assert_eq!(policies[0]["category"], "Dairy");
    assert!(policies[0]["safety_stock"]["method"].is_string());
}

#[tokio::test]
async fn restocking_respects_limit_and_urgency() {
    let (status, body) = send(app(), "GET", "/api/v1/inventory/restocking?min_urgency=Low&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().expect("items");
    assert!(items.len() <= 3);
    assert_eq!(body["total"].as_u64(), Some(items.len() as u64));

    let (_, body) = send(app(), "GET", "/api/v1/inventory/restocking?min_urgency=Critical").await;
    for item in body["items"].as_array().expect("items") {
        assert_eq!(item["urgency"], "Critical");
    }
}

#[tokio::test]
async fn refresh_recomputes_the_same_report() {
    let app = app();
    let (_, before) = send(app.clone(), "GET", "/api/v1/key_metrics").await;
    let (status, body) = send(app.clone(), "POST", "/api/v1/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "refreshed");
    let (_, after) = send(app, "GET", "/api/v1/key_metrics").await;
    assert_eq!(before, after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_one_report() {
    let config = AnalysisConfig::default();
    let dir = TempDir::new().expect("tempdir");
    synthetic::generate(&SyntheticParams::new(config.stores.clone()), 21)
        .write_dir(dir.path())
        .expect("write dataset");
    let service = Arc::new(DashboardService::new(dir.path(), config));

    let (a, b) = tokio::join!(service.get_report(), service.get_report());
    let (a, b) = (a.expect("first report"), b.expect("second report"));
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.delivery_zones.len(), 5);

    service.refresh().await;
    let c = service.get_report().await.expect("recomputed report");
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(a.key_metrics.orders, c.key_metrics.orders);
}
