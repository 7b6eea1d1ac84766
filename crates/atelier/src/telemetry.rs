//! Process-wide logging setup.
//!
//! Installs a `tracing` subscriber (env filter + fmt layer, plain or JSON)
//! and forwards `log` records into it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::AtelierError;

/// Initializes global logging.
///
/// `RUST_LOG` overrides the configured level. Returns `Ok(false)` when a
/// global subscriber was already installed, leaving it in place.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, AtelierError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            AtelierError::Logging(format!("invalid log level '{}': {}", config.level, e))
        })?,
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return Ok(false);
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log records are not bridged: {}", e);
    }
    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(true)
}
