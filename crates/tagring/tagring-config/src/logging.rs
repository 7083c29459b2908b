//! Log subscriber bootstrap for producers and analysis processes.

use crate::ConfigError;
use tracing_subscriber::EnvFilter;

/// Build the filter for `level`. `RUST_LOG`, when set and valid, wins.
pub fn filter(level: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(from_env) => Ok(from_env),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Install a global fmt subscriber. Fails if one is already installed.
pub fn init(level: &str) -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .with_target(true)
        .try_init()
        .map_err(ConfigError::Logging)?;
    tracing::debug!(target: "tagring::config", level, "log subscriber installed");
    Ok(())
}
