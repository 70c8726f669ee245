//! Configuration types for FamDB
//!
//! These settings govern tooling behavior only (partitioner defaults, append
//! leniency, logging verbosity) -- they are never part of the on-disk wire
//! format and are not consulted when validating cross-file consistency.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FamdbResult;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub append: AppendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Default size bound `S` in bytes, used when no explicit bound is given.
    #[serde(default = "default_chunk_bound")]
    pub default_chunk_bound: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendConfig {
    /// If true, a family whose clade cannot be resolved during EMBL append
    /// is skipped with a warning rather than rejected outright.
    #[serde(default = "default_lenient_clades")]
    pub lenient_unresolved_clades: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_chunk_bound() -> u64 {
    100_000_000_000
}
fn default_lenient_clades() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            default_chunk_bound: default_chunk_bound(),
        }
    }
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            lenient_unresolved_clades: default_lenient_clades(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> FamdbResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> FamdbResult<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Initialize the global `tracing` subscriber from the environment
/// (`RUST_LOG`), falling back to `config.logging.level`. Intended to be
/// called once by the CLI entry point.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(
            config.partition.default_chunk_bound,
            back.partition.default_chunk_bound
        );
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        let err = Config::load(Path::new("/nonexistent/famdb.toml")).unwrap_err();
        assert!(matches!(err, crate::error::FamdbError::Io(_)));
    }
}
