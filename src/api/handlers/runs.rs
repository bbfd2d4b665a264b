//! Run read endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::middleware::TenantExtension;
use crate::error::ApiError;
use crate::ingest::ProductProcessResult;
use crate::ingest::run_id::is_valid_run_id;
use crate::server::AppState;
use crate::store::RunRecord;

use super::types::ListParams;

const LIST_DEFAULT_LIMIT: usize = 50;
const LIST_MAX_LIMIT: usize = 200;
const PRODUCTS_DEFAULT_LIMIT: usize = 500;
const PRODUCTS_MAX_LIMIT: usize = 2000;

#[derive(Debug, Serialize, ToSchema)]
pub struct RunListResponse {
    pub items: Vec<RunRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunDetailResponse {
    pub run: RunRecord,
    pub products: Vec<ProductProcessResult>,
}

/// Lists the tenant's runs, newest first.
#[utoipa::path(
    get,
    path = "/v1/debug/runs",
    params(("limit" = Option<i64>, Query, description = "Max runs returned (default 50, cap 200)")),
    responses(
        (status = 200, description = "Runs for the tenant", body = RunListResponse),
        (status = 500, description = "Listing failed", body = crate::error::ApiError)
    ),
    tag = "runs"
)]
pub async fn list(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.clamp(LIST_DEFAULT_LIMIT, LIST_MAX_LIMIT);

    match state.store.list_runs(tenant_id, limit).await {
        Ok(items) => Json(RunListResponse { items }).into_response(),
        Err(err) => ApiError::internal("list_runs_failed", err.to_string()).into_response(),
    }
}

/// Fetches one run and its per-product results.
#[utoipa::path(
    get,
    path = "/v1/debug/runs/{run_id}",
    params(
        ("run_id" = String, Path, description = "Run identifier"),
        ("limit" = Option<i64>, Query, description = "Max products returned (default 500, cap 2000)")
    ),
    responses(
        (status = 200, description = "Run with products", body = RunDetailResponse),
        (status = 400, description = "Malformed run id", body = crate::error::ApiError),
        (status = 404, description = "Run not found for this tenant", body = crate::error::ApiError)
    ),
    tag = "runs"
)]
pub async fn detail(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    Path(run_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let run_id = run_id.trim();
    if !is_valid_run_id(run_id) {
        return ApiError::bad_request("invalid_run_id", "run_id missing or invalid")
            .into_response();
    }

    let run = match state.store.get_run(tenant_id, run_id).await {
        Ok(Some(run)) => run,
        Ok(None) => return ApiError::not_found("run not found").into_response(),
        Err(err) => {
            return ApiError::internal("get_run_failed", err.to_string()).into_response();
        }
    };

    let limit = params.clamp(PRODUCTS_DEFAULT_LIMIT, PRODUCTS_MAX_LIMIT);

    match state.store.list_run_products(run_id, limit).await {
        Ok(products) => Json(RunDetailResponse { run, products }).into_response(),
        Err(err) => {
            ApiError::internal("list_run_products_failed", err.to_string()).into_response()
        }
    }
}
