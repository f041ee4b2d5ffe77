//! Application configuration management.

use serde::Deserialize;

use crate::types::time::RegionalOffset;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Regional time configuration.
    #[serde(default)]
    pub regional: RegionalConfig,
    /// Bank reconciliation configuration.
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Regional time configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RegionalConfig {
    /// Offset used to interpret naive resident-reported times.
    #[serde(default)]
    pub utc_offset_hours: RegionalOffset,
}

/// Bank reconciliation configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatchingConfig {
    /// Maximum distance between claimed and bank time for an automatic match.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u32,
}

fn default_tolerance_secs() -> u32 {
    60
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("MOOBAAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
