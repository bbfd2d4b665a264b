//! Per-run channel result endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::middleware::TenantExtension;
use crate::error::ApiError;
use crate::server::AppState;
use crate::store::{RunChannelItemRecord, RunChannelResultRecord};

use super::types::ListParams;

const ITEMS_DEFAULT_LIMIT: usize = 1000;
const ITEMS_MAX_LIMIT: usize = 5000;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelResultsResponse {
    pub items: Vec<RunChannelResultRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelItemsResponse {
    pub run_id: String,
    pub channel: String,
    pub items: Vec<RunChannelItemRecord>,
}

/// Lists the channel results recorded for a run.
#[utoipa::path(
    get,
    path = "/v1/debug/runs/{run_id}/channels",
    params(("run_id" = String, Path, description = "Run identifier")),
    responses(
        (status = 200, description = "Channel results for the run", body = ChannelResultsResponse),
        (status = 404, description = "Run not found for this tenant", body = crate::error::ApiError)
    ),
    tag = "runs"
)]
pub async fn list_results(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    Path(run_id): Path<String>,
) -> Response {
    match state.store.get_run(tenant_id, &run_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return ApiError::not_found("run not found").into_response(),
        Err(err) => {
            return ApiError::internal("get_run_failed", err.to_string()).into_response();
        }
    }

    match state.store.list_run_channel_results(tenant_id, &run_id).await {
        Ok(items) => Json(ChannelResultsResponse { items }).into_response(),
        Err(err) => ApiError::internal("list_failed", err.to_string()).into_response(),
    }
}

/// Lists the per-product items one channel produced for a run.
#[utoipa::path(
    get,
    path = "/v1/debug/runs/{run_id}/channels/{channel}",
    params(
        ("run_id" = String, Path, description = "Run identifier"),
        ("channel" = String, Path, description = "Channel name"),
        ("limit" = Option<i64>, Query, description = "Max items returned (default 1000)")
    ),
    responses(
        (status = 200, description = "Items the channel produced", body = ChannelItemsResponse),
        (status = 404, description = "Run not found for this tenant", body = crate::error::ApiError)
    ),
    tag = "runs"
)]
pub async fn list_items(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    Path((run_id, channel)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Response {
    match state.store.get_run(tenant_id, &run_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return ApiError::not_found("run not found").into_response(),
        Err(err) => {
            return ApiError::internal("get_run_failed", err.to_string()).into_response();
        }
    }

    let limit = params.clamp(ITEMS_DEFAULT_LIMIT, ITEMS_MAX_LIMIT);

    match state
        .store
        .list_run_channel_items(&run_id, &channel, limit)
        .await
    {
        Ok(items) => Json(ChannelItemsResponse {
            run_id,
            channel,
            items,
        })
        .into_response(),
        Err(err) => ApiError::internal("list_failed", err.to_string()).into_response(),
    }
}
