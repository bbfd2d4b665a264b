//! Server setup: shared state, router assembly, and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use jsonwebtoken::DecodingKey;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::api::middleware::{auth_middleware, idempotency_middleware, tenant_middleware};
use crate::config::AppConfig;
use crate::ingest::Processor;
use crate::store::Store;

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    /// Raw connection for health checks; only set on the sql backend.
    pub db: Option<DatabaseConnection>,
    /// RS256 verification key; absent in dev when no key is configured.
    pub decoding_key: Option<Arc<DecodingKey>>,
    /// Channels enabled for ingested feeds.
    pub enabled_channels: Arc<Vec<String>>,
    pub processor: Processor,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        db: Option<DatabaseConnection>,
        decoding_key: Option<DecodingKey>,
        enabled_channels: Vec<String>,
    ) -> Self {
        Self {
            config,
            store,
            db,
            decoding_key: decoding_key.map(Arc::new),
            enabled_channels: Arc::new(enabled_channels),
            processor: Processor::new(),
        }
    }

    /// Minimal state for router-level tests: no database, no JWT key.
    pub fn for_tests(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        Self::new(config, store, None, None, vec!["google".to_string()])
    }
}

/// Creates and configures the application router.
///
/// Middleware order matters: auth runs first, tenant binding second, and
/// idempotent replay wraps only the ingest endpoints.
pub fn create_app(state: AppState) -> Router {
    let ingest = Router::new()
        .route("/v1/debug/products:upsert", post(handlers::upsert::handle))
        .route(
            "/v1/debug/products:upsert-bulk",
            post(handlers::upsert_bulk::handle),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            idempotency_middleware,
        ));

    let debug = Router::new()
        .merge(ingest)
        .route("/v1/debug/runs", get(handlers::runs::list))
        .route("/v1/debug/runs/{run_id}", get(handlers::runs::detail))
        .route(
            "/v1/debug/runs/{run_id}/channels",
            get(handlers::run_channels::list_results),
        )
        .route(
            "/v1/debug/runs/{run_id}/channels/{channel}",
            get(handlers::run_channels::list_items),
        )
        .layer(middleware::from_fn_with_state(state.clone(), tenant_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(debug)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server and blocks until shutdown completes.
pub async fn run_server(config: Arc<AppConfig>, state: AppState) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, env = %config.env, "server listening");

    let app = create_app(state);

    let shutdown = CancellationToken::new();
    let serve_token = shutdown.clone();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(res) => res??,
        Err(_) => {
            warn!("graceful shutdown grace period elapsed; closing sockets");
            server.abort();
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::root,
        crate::api::handlers::healthz,
        crate::api::handlers::upsert::handle,
        crate::api::handlers::upsert_bulk::handle,
        crate::api::handlers::runs::list,
        crate::api::handlers::runs::detail,
        crate::api::handlers::run_channels::list_results,
        crate::api::handlers::run_channels::list_items,
    ),
    components(
        schemas(
            crate::api::handlers::ServiceInfo,
            crate::api::handlers::HealthResponse,
            crate::api::handlers::types::RunResponse,
            crate::api::handlers::runs::RunListResponse,
            crate::api::handlers::runs::RunDetailResponse,
            crate::api::handlers::run_channels::ChannelResultsResponse,
            crate::api::handlers::run_channels::ChannelItemsResponse,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Conduit API",
        description = "Multi-tenant product catalog delta-ingest service",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
