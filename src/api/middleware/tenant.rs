//! Tenant binding middleware.
//!
//! In `dev`, an `X-Tenant-ID` header overrides the request tenant so local
//! tooling can work without tokens. In every other environment the tenant
//! comes exclusively from the authenticated token; a request that reaches a
//! handler with no tenant bound falls back to the reserved default.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::domain::TenantId;
use crate::error::ApiError;
use crate::server::AppState;

/// Header honored in dev only.
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// The tenant bound to the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantExtension(pub TenantId);

pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.config.is_dev() {
        if let Some(raw) = request.headers().get(TENANT_HEADER) {
            let raw = raw.to_str().unwrap_or("").trim();
            if !raw.is_empty() {
                match raw.parse::<u64>() {
                    Ok(v) if v > 0 => {
                        request.extensions_mut().insert(TenantExtension(TenantId(v)));
                    }
                    _ => {
                        return ApiError::bad_request(
                            "invalid_tenant_id",
                            "X-Tenant-ID must be a positive integer",
                        )
                        .into_response();
                    }
                }
            }
        }
    }

    if request.extensions().get::<TenantExtension>().is_none() {
        request
            .extensions_mut()
            .insert(TenantExtension(TenantId::DEFAULT));
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for TenantExtension
where
    S: Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TenantExtension>()
            .copied()
            .unwrap_or(TenantExtension(TenantId::DEFAULT)))
    }
}
