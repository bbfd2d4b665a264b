//! Single-array ingest endpoint.

use axum::{body::Bytes, extract::State, response::IntoResponse, response::Response};

use crate::api::middleware::TenantExtension;
use crate::error::ApiError;
use crate::ingest::{new_run_id, parse_products};
use crate::server::AppState;

use super::types::persist_and_respond;

/// Ingests a JSON array of products and records a run.
#[utoipa::path(
    post,
    path = "/v1/debug/products:upsert",
    request_body(content = String, content_type = "application/json", description = "JSON array of products"),
    responses(
        (status = 200, description = "Run recorded", body = super::types::RunResponse),
        (status = 400, description = "Body is not a JSON array of objects", body = crate::error::ApiError),
        (status = 500, description = "Processing or persistence failed", body = crate::error::ApiError)
    ),
    tag = "ingest"
)]
pub async fn handle(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    body: Bytes,
) -> Response {
    let run_id = new_run_id();

    let parsed = match parse_products(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return ApiError::bad_request("invalid_json", err.to_string()).into_response();
        }
    };

    let store = state.store.clone();
    let lookup = move |key: String| {
        let store = store.clone();
        async move { store.get_product_hash(tenant_id, &key).await }
    };

    let out = match state
        .processor
        .process_products(&parsed.products, &state.enabled_channels, &lookup)
        .await
    {
        Ok(out) => out,
        Err(err) => {
            return ApiError::internal("processing_failed", err.to_string()).into_response();
        }
    };

    persist_and_respond(&state, tenant_id, run_id, &parsed.products, out, parsed.warnings).await
}
