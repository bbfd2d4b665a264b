//! Idempotent replay behavior, including tenant scoping.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{dev_app, dev_app_with_store, product_json, send};
use conduit::domain::TenantId;
use conduit::store::Store;

fn upsert_for_tenant(tenant: u64, idem_key: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/debug/products:upsert")
        .header("content-type", "application/json")
        .header("X-Tenant-ID", tenant.to_string())
        .header("Idempotency-Key", idem_key)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn retry_replays_the_cached_response() {
    let (_, store) = dev_app();
    let body = serde_json::json!([product_json("sku1", "One")]).to_string();

    let (status, first) = send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "retry-key", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "retry-key", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Byte-for-byte replay: same run_id, same summary, no re-execution.
    assert_eq!(first, second);
    assert_eq!(second["result"]["summary"]["enqueued"], 1);

    let runs = store.list_runs(TenantId(1), 0).await.unwrap();
    assert_eq!(runs.len(), 1, "retry must not execute a second run");
}

#[tokio::test]
async fn same_key_different_tenants_do_not_collide() {
    let (_, store) = dev_app();
    let body = serde_json::json!([product_json("sku1", "One")]).to_string();

    let (_, tenant1_response) = send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "same-key", &body),
    )
    .await;

    // Tenant 1 retry: served from cache.
    let (_, tenant1_retry) = send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "same-key", &body),
    )
    .await;
    assert_eq!(tenant1_response, tenant1_retry);

    // Tenant 2 with the identical key: a fresh execution.
    let (status, tenant2_response) = send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(2, "same-key", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(tenant2_response["run_id"], tenant1_response["run_id"]);

    // Exactly two downstream executions in total.
    let tenant1_runs = store.list_runs(TenantId(1), 0).await.unwrap();
    let tenant2_runs = store.list_runs(TenantId(2), 0).await.unwrap();
    assert_eq!(tenant1_runs.len() + tenant2_runs.len(), 2);
}

#[tokio::test]
async fn different_keys_execute_separately() {
    let (_, store) = dev_app();
    let body = serde_json::json!([product_json("sku1", "One")]).to_string();

    send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "key-a", &body),
    )
    .await;
    send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "key-b", &body),
    )
    .await;

    let runs = store.list_runs(TenantId(1), 0).await.unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn requests_without_key_are_never_cached() {
    let (_, store) = dev_app();
    let body = serde_json::json!([product_json("sku1", "One")]).to_string();

    let plain = |body: String| {
        Request::builder()
            .method("POST")
            .uri("/v1/debug/products:upsert")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    let (_, first) = send(dev_app_with_store(store.clone()), plain(body.clone())).await;
    let (_, second) = send(dev_app_with_store(store.clone()), plain(body)).await;

    assert_ne!(first["run_id"], second["run_id"]);
}

#[tokio::test]
async fn get_requests_bypass_the_cache() {
    let (_, store) = dev_app();
    let body = serde_json::json!([product_json("sku1", "One")]).to_string();

    send(
        dev_app_with_store(store.clone()),
        upsert_for_tenant(1, "list-key", &body),
    )
    .await;

    // A GET with the same key must not be cached or replayed.
    let request = Request::builder()
        .uri("/v1/debug/runs")
        .header("X-Tenant-ID", "1")
        .header("Idempotency-Key", "list-key")
        .body(Body::empty())
        .unwrap();

    let (status, list) = send(dev_app_with_store(store), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["items"].is_array());
}
