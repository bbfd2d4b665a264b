//! HTTP endpoint handlers.

pub mod run_channels;
pub mod runs;
pub mod types;
pub mod upsert;
pub mod upsert_bulk;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db;
use crate::server::AppState;

/// Basic service information returned at the root path.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "conduit",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub backend: crate::config::StateBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness/readiness probe. Pings the database on the sql backend.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "ops"
)]
pub async fn healthz(State(state): State<AppState>) -> Response {
    let backend = state.config.state_backend;

    if let Some(conn) = &state.db {
        let ping = tokio::time::timeout(std::time::Duration::from_secs(2), db::health_check(conn)).await;

        let failure = match ping {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("database ping timed out".to_string()),
        };

        if let Some(error) = failure {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    ok: false,
                    backend,
                    db_ok: Some(false),
                    error: Some(error),
                }),
            )
                .into_response();
        }

        return Json(HealthResponse {
            ok: true,
            backend,
            db_ok: Some(true),
            error: None,
        })
        .into_response();
    }

    Json(HealthResponse {
        ok: true,
        backend,
        db_ok: None,
        error: None,
    })
    .into_response()
}
