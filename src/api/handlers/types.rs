//! Shared request/response shapes and the persist-and-respond tail both
//! ingest handlers run after processing.

use std::collections::HashMap;

use axum::{Json, response::IntoResponse, response::Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Product, ProductDisposition, RunStatus, TenantId};
use crate::error::ApiError;
use crate::ingest::{ProcessOutput, UnknownKeyWarning};
use crate::server::AppState;
use crate::store::{ProductDocRecord, RunRecord};

/// The successful response of both ingest endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub push_triggered: bool,
    pub warnings: UnknownKeyWarning,
    pub result: ProcessOutput,
}

/// Query parameters accepted by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    /// Applies the default and cap for this endpoint.
    pub fn clamp(&self, default: usize, max: usize) -> usize {
        match self.limit {
            Some(v) if v > 0 => (v as usize).min(max),
            _ => default,
        }
    }
}

/// Picks the run status from the counters, per the run invariants.
pub fn status_for(push_triggered: bool, rejected: usize) -> RunStatus {
    if push_triggered {
        RunStatus::HasChanges
    } else if rejected == 0 {
        RunStatus::NoChangeDetected
    } else {
        RunStatus::Completed
    }
}

/// Persists product state, the run record, and its product results, then
/// renders the 200 response.
///
/// Nothing is written to the client until the run and all its product rows
/// are durable. Product-state upserts that land before a later failure stay
/// in place; the next submission simply observes them as unchanged.
pub async fn persist_and_respond(
    state: &AppState,
    tenant_id: TenantId,
    run_id: String,
    products: &[Product],
    out: ProcessOutput,
    warnings: UnknownKeyWarning,
) -> Response {
    let payload_by_key: HashMap<&str, &Product> = products
        .iter()
        .map(|p| (p.product_key.as_str(), p))
        .collect();

    for result in &out.products {
        if result.hash.is_empty() {
            continue;
        }

        match result.disposition {
            ProductDisposition::Enqueued | ProductDisposition::Unchanged => {}
            ProductDisposition::Rejected => continue,
        }

        if let Err(err) = state
            .store
            .upsert_product_hash(tenant_id, &result.product_key, &result.hash)
            .await
        {
            return ApiError::internal("persist_product_state_failed", err.to_string())
                .with_product(&result.product_key)
                .into_response();
        }

        let Some(payload) = payload_by_key.get(result.product_key.as_str()) else {
            continue;
        };

        let doc_bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(_) => {
                return ApiError::internal(
                    "persist_product_doc_failed",
                    "failed to serialize product doc",
                )
                .with_product(&result.product_key)
                .into_response();
            }
        };

        if let Err(err) = state
            .store
            .upsert_product_doc(
                tenant_id,
                &result.product_key,
                ProductDocRecord {
                    product_json: doc_bytes,
                    ..Default::default()
                },
            )
            .await
        {
            return ApiError::internal("persist_product_doc_failed", err.to_string())
                .with_product(&result.product_key)
                .into_response();
        }
    }

    let push_triggered = out.summary.enqueued > 0;
    let status = status_for(push_triggered, out.summary.rejected);

    let run = RunRecord {
        run_id: run_id.clone(),
        tenant_id,
        feed_id: None,
        status,
        push_triggered,
        received: out.summary.received,
        valid: out.summary.valid,
        rejected: out.summary.rejected,
        unchanged: out.summary.unchanged,
        enqueued: out.summary.enqueued,
        warnings: warnings.clone(),
        created_at: Utc::now(),
    };

    if let Err(err) = state.store.insert_run(run).await {
        return ApiError::internal("persist_run_failed", err.to_string())
            .with_run_id(&run_id)
            .into_response();
    }

    if let Err(err) = state.store.insert_run_products(&run_id, &out.products).await {
        return ApiError::internal("persist_run_products_failed", err.to_string())
            .with_run_id(&run_id)
            .into_response();
    }

    tracing::info!(
        run_id = %run_id,
        tenant_id = %tenant_id,
        status = %status,
        received = out.summary.received,
        rejected = out.summary.rejected,
        unchanged = out.summary.unchanged,
        enqueued = out.summary.enqueued,
        "run recorded"
    );

    (
        [("content-type", "application/json; charset=utf-8")],
        Json(RunResponse {
            run_id,
            status,
            push_triggered,
            warnings,
            result: out,
        }),
    )
        .into_response()
}
