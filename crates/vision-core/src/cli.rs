//! Shared CLI helpers for workspace tools.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Installs the global subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbose))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Logger already initialized: {e}")))?;

    debug!("Logging initialized at {default_level}");
    Ok(())
}

/// Reads a TOML file into `T`; missing sections take their defaults
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;
    let value = toml::from_str(&text)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {e}", path.display())))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(value)
}

/// Writes `value` as pretty TOML, creating parent directories as needed
pub fn save_toml_config<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(value)?)?;
    debug!("Saved configuration to {}", path.display());
    Ok(())
}
