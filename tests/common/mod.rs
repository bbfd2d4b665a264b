//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use conduit::config::AppConfig;
use conduit::server::{AppState, create_app};
use conduit::store::MemoryStore;

/// A dev-profile app over a fresh in-memory store.
pub fn dev_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = dev_app_with_store(store.clone());
    (app, store)
}

/// A dev-profile app over the given store.
pub fn dev_app_with_store(store: Arc<MemoryStore>) -> Router {
    let state = AppState::for_tests(Arc::new(AppConfig::default()), store);
    create_app(state)
}

/// Sends a request and returns status plus decoded JSON body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request failed");
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Builds a POST request for the single-array ingest endpoint.
pub fn upsert_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/debug/products:upsert")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A complete, valid product body with a Google channel block.
pub fn product_json(key: &str, title: &str) -> Value {
    serde_json::json!({
        "product_key": key,
        "title": title,
        "description": "Desc",
        "link": format!("https://example.com/p/{key}"),
        "image_link": format!("https://example.com/p/{key}.jpg"),
        "condition": "new",
        "availability": "in_stock",
        "price": {"amount_decimal": "19.99", "currency": "USD"},
        "channel": {"google": {"control": {"state": "active"}}}
    })
}
