//! Service entry point: the API server, the worker loop, and a one-shot
//! migration runner behind one CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use conduit::api::middleware::auth::load_decoding_key;
use conduit::channels::{Channel, GoogleChannel, Registry};
use conduit::config::{self, AppConfig, StateBackend};
use conduit::execute::Executor;
use conduit::server::{AppState, run_server};
use conduit::store::new_store;
use conduit::worker::Runner;
use conduit::{migrate, telemetry};

/// Channels enabled for ingested feeds. Per-feed configuration arrives with
/// feed records; until then every feed pushes to Google.
const ENABLED_CHANNELS: [&str; 1] = ["google"];

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Product catalog delta-ingest service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest API server (default)
    Api,
    /// Run the background worker loop
    Worker,
    /// Apply pending SQL migrations and exit
    Migrate {
        /// Directory containing *.sql files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(config::load()?);
    telemetry::init_tracing(&config);

    info!(
        env = %config.env,
        port = config.port,
        backend = ?config.state_backend,
        run_migrations = config.run_migrations,
        "configuration loaded"
    );
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "full configuration");
    }

    match cli.command.unwrap_or(Commands::Api) {
        Commands::Api => run_api(config).await,
        Commands::Worker => run_worker(config).await,
        Commands::Migrate { dir } => run_migrate(config, dir).await,
    }
}

async fn run_api(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let handle = new_store(&config).await?;

    // RS256 public key for bearer verification. Dev may run without one so
    // the X-Tenant-ID flow keeps working.
    let decoding_key = match &config.jwt_public_key_path {
        Some(path) => match load_decoding_key(path) {
            Ok(key) => Some(key),
            Err(err) if config.is_dev() => {
                tracing::warn!(error = %err, "JWT public key not loaded; dev requests pass unauthenticated");
                None
            }
            Err(err) => return Err(err),
        },
        None if config.is_dev() => None,
        None => anyhow::bail!("JWT_PUBLIC_KEY_PATH is required outside dev"),
    };

    if config.run_migrations {
        if let Some(db) = &handle.db {
            migrate::apply_dir(db, std::path::Path::new("migrations")).await?;
            info!("migrations applied");
        }
    }

    // Dev bootstrap: make sure the debug tenant exists so local ingests have
    // an owner row to point at.
    if config.is_dev() {
        if let Some(db) = &handle.db {
            bootstrap_debug_tenant(db).await?;
        }
    }

    let state = AppState::new(
        Arc::clone(&config),
        handle.store,
        handle.db,
        decoding_key,
        ENABLED_CHANNELS.iter().map(|s| s.to_string()).collect(),
    );

    run_server(config, state).await
}

async fn run_worker(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let handle = new_store(&config).await?;
    let store = handle.store;

    let registry = Registry::new([Arc::new(GoogleChannel::new(store.clone())) as Arc<dyn Channel>]);

    let executor = Arc::new(
        Executor::new(store.clone())
            .with_registry(registry)
            .with_enabled_channels(ENABLED_CHANNELS.iter().map(|s| s.to_string()).collect()),
    );

    let runner = Runner::new(store)
        .with_poll_every(Duration::from_millis(config.worker_poll_ms))
        .with_max_per_claim(config.worker_max_per_claim)
        .with_process_fn(move |job| {
            let executor = executor.clone();
            async move {
                executor
                    .execute(&job.run_id, job.tenant_id)
                    .await
                    .map_err(anyhow::Error::from)
            }
        });

    let shutdown = CancellationToken::new();
    let runner_token = shutdown.clone();

    let mut runner_handle = tokio::spawn(async move { runner.run(runner_token).await });

    tokio::select! {
        // The runner only returns early when claiming fails outright.
        res = &mut runner_handle => {
            let err = match res? {
                Ok(()) | Err(conduit::worker::RunnerError::Cancelled) => {
                    info!("worker stopped");
                    return Ok(());
                }
                Err(err) => err,
            };
            error!(error = %err, "worker stopped with error");
            return Err(err.into());
        }
        _ = wait_for_shutdown() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    }

    match runner_handle.await? {
        Ok(()) | Err(conduit::worker::RunnerError::Cancelled) => {
            info!("worker stopped");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "worker stopped with error");
            Err(err.into())
        }
    }
}

async fn run_migrate(config: Arc<AppConfig>, dir: PathBuf) -> anyhow::Result<()> {
    if config.state_backend != StateBackend::Sql {
        anyhow::bail!("migrations require STATE_BACKEND=sql");
    }

    let db = conduit::db::init_pool(&config.db_dsn).await?;
    migrate::apply_dir(&db, &dir).await?;
    info!("migrations applied");
    Ok(())
}

async fn bootstrap_debug_tenant(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    use conduit::models::tenant;
    use sea_orm::sea_query::OnConflict;
    use sea_orm::{EntityTrait, Set};

    let model = tenant::ActiveModel {
        tenant_id: Set(1),
        name: Set("debug".to_string()),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    };

    tenant::Entity::insert(model)
        .on_conflict(
            OnConflict::column(tenant::Column::TenantId)
                .update_column(tenant::Column::Name)
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

async fn wait_for_shutdown() {
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
