//! Global tracing subscriber management.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{EnvFilter, fmt, layer::Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing exactly once.
///
/// The filter comes from `RUST_LOG` when set, falling back to the configured
/// log level. Output format is JSON unless `LOG_FORMAT=pretty`.
pub fn init_tracing(config: &AppConfig) {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: failed to set global tracing subscriber: {}. Default subscriber remains in effect.",
            err
        );
    }
}
