//! Idempotent request replay.
//!
//! Mutating requests carrying an `Idempotency-Key` header are cached by
//! (tenant, path, key hash) for 24 hours and replayed verbatim on retry.
//! The cache is written only after the downstream handler has produced its
//! response; a cache write failure never fails the request.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};

use crate::error::ApiError;
use crate::server::AppState;
use crate::store::{IDEMPOTENCY_TTL_HOURS, IdempotencyRecord, hash_idempotency_key};

use super::tenant::TenantExtension;

/// Header that opts a request into idempotent handling.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub async fn idempotency_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method();
    let replayable = method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE;
    if !replayable {
        return next.run(request).await;
    }

    let idem_key = request
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string();

    if idem_key.is_empty() {
        return next.run(request).await;
    }

    let mut endpoint = request.uri().path().trim().to_string();
    if endpoint.is_empty() {
        endpoint = "/".to_string();
    }

    let tenant_id = request
        .extensions()
        .get::<TenantExtension>()
        .copied()
        .unwrap_or(TenantExtension(crate::domain::TenantId::DEFAULT))
        .0;

    let key_hash = hash_idempotency_key(&idem_key);

    let cached = match state
        .store
        .get_idempotency(tenant_id, &endpoint, &key_hash)
        .await
    {
        Ok(cached) => cached,
        Err(err) => {
            tracing::error!(error = %err, "idempotency lookup failed");
            return ApiError::internal("idempotency_lookup_failed", "idempotency lookup failed")
                .into_response();
        }
    };

    if let Some(rec) = cached {
        let status = StatusCode::from_u16(rec.status_code).unwrap_or(StatusCode::OK);
        return (
            status,
            [("content-type", "application/json; charset=utf-8")],
            rec.body,
        )
            .into_response();
    }

    let response = next.run(request).await;

    // Buffer the response so the same bytes can be cached and returned.
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to buffer response for idempotency cache");
            return ApiError::internal("idempotency_lookup_failed", "response capture failed")
                .into_response();
        }
    };

    let now = Utc::now();
    let record = IdempotencyRecord {
        status_code: parts.status.as_u16(),
        body: bytes.to_vec(),
        created_at: now,
        expires_at: now + Duration::hours(IDEMPOTENCY_TTL_HOURS),
    };

    if let Err(err) = state
        .store
        .put_idempotency(tenant_id, &endpoint, &key_hash, record)
        .await
    {
        // The response is already correct; a failed cache write only costs
        // a replay on retry.
        tracing::warn!(error = %err, "idempotency cache write failed");
    }

    Response::from_parts(parts, Body::from(bytes))
}
