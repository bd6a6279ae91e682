//! End-to-end smoke tests driving the full Axum router over an in-memory
//! storage and cache backend, with no network socket involved.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use codeintel_api::{AppState, HashingEmbedder};
use codeintel_core::config::CodeIntelConfig;
use codeintel_learning::LearningBridge;
use codeintel_retrieval::HybridRetrieval;
use codeintel_storage::{CacheFabric, InMemoryCacheFabric, InMemoryStorage, StorageFacade};
use codeintel_test_utils::fixtures;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (axum::Router, Arc<dyn StorageFacade>) {
    let config = CodeIntelConfig::default();
    let storage: Arc<dyn StorageFacade> = Arc::new(InMemoryStorage::new());
    let cache: Arc<dyn CacheFabric> = Arc::new(InMemoryCacheFabric::new(&config.cache));
    let embedder = Arc::new(HashingEmbedder::default());

    let retrieval = Arc::new(HybridRetrieval::new(
        storage.clone(),
        cache.clone(),
        embedder,
        config.clone(),
    ));
    let learning = Arc::new(LearningBridge::new(cache.clone(), config.learning.clone()));

    let state = AppState {
        retrieval,
        learning,
        storage: storage.clone(),
        cache,
        config: Arc::new(config),
        start_time: Instant::now(),
    };

    (codeintel_api::create_router(state), storage)
}

async fn seed_parse_tree_chunk(storage: &Arc<dyn StorageFacade>) {
    let span = fixtures::minimal_span("acme/widgets", "src/parser.rs", "parse_tree");
    storage.insert_span(span.clone()).await.unwrap();
    let chunk = fixtures::chunk_for_span(&span, "fn parse_tree(input: &str) -> Tree { todo!() }");
    storage.insert_chunk(chunk).await.unwrap();
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `BundleSignature` is a content-addressed hex ID; its nil value is valid
/// hex input for deserialization even though it was never actually assembled.
fn nil_bundle_signature() -> String {
    use codeintel_core::identity::{BundleSignature, ContentIdType};
    BundleSignature::nil().to_string()
}

#[tokio::test]
async fn search_returns_fused_results_for_seeded_content() {
    let (app, storage) = test_app().await;
    seed_parse_tree_chunk(&storage).await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/search")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"query": "parse tree", "repo": "acme/widgets", "limit": 5}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let results = body["results"].as_array().expect("results array");
    assert!(!results.is_empty(), "expected at least one fused result for a seeded chunk");
}

#[tokio::test]
async fn search_rejects_empty_query() {
    let (app, _storage) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/search")
        .header("content-type", "application/json")
        .body(Body::from(json!({"query": "   "}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assemble_returns_a_well_formed_bundle_within_budget() {
    let (app, storage) = test_app().await;
    seed_parse_tree_chunk(&storage).await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/assemble")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"query": "parse tree", "repo": "acme/widgets", "budget_tokens": 2000}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let total_tokens = body["total_tokens"].as_i64().expect("total_tokens");
    let budget = body["budget"].as_i64().expect("budget");
    assert!(total_tokens <= budget);
}

#[tokio::test]
async fn record_outcome_is_accepted_and_increments_pending_queue() {
    let (app, _storage) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/outcomes")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "session_id": "session-1",
                "query": "parse tree",
                "intent": "search",
                "bundle_signature": nil_bundle_signature(),
                "satisfied": true,
                "confidence": 0.9,
                "time_to_fix_ms": 1200,
                "top_click_id": null,
                "token_usage": 256
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["pending"], json!(1));
}

#[tokio::test]
async fn health_reports_overall_status_and_component_breakdown() {
    let (app, _storage) = test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["status"].is_string());
    assert_eq!(body["cache"].as_array().unwrap().len(), 4);
    assert_eq!(body["circuits"].as_array().unwrap().len(), 4);
    assert!(body["storage"].is_object());
}

#[tokio::test]
async fn metrics_exposes_prometheus_text_format() {
    let (app, _storage) = test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("codeintel"));
}
