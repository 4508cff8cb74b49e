//! Tracing subscriber bootstrap.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::{Result, RuntimeError};

/// Install the global subscriber. `RUST_LOG` wins over `config.level`.
///
/// # Errors
/// Returns `RuntimeError::Telemetry` if the level is not a valid filter or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| RuntimeError::Telemetry(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.map_err(|e| RuntimeError::Telemetry(e.to_string()))?;

    tracing::info!(level = %config.level, json = config.json, "tracing initialised");
    Ok(())
}
