//! Subscriber setup.
//!
//! Library code only emits `tracing` events (gated on the runtime
//! `debug_level`); installing a subscriber is the embedding binary's call.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;
use crate::error::{LowmemError, Result};

/// Install a global fmt subscriber filtered by `config.log_filter`.
///
/// `RUST_LOG`, when set, takes precedence over the configured filter.
///
/// # Errors
/// `Config` if the filter directive is invalid or a global subscriber is
/// already installed.
pub fn init(config: &GeneralConfig) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(&config.log_filter),
    }
    .map_err(|e| LowmemError::Config(format!("log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| LowmemError::Config(format!("logging already initialised: {e}")))
}
