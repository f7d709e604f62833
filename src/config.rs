//! Configuration module for Reputation Core.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::auth::ConfiguredApiKey;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// API authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// When false every route is public.
    #[serde(default)]
    pub enabled: bool,
    /// Keys accepted on protected routes.
    #[serde(default)]
    pub api_keys: Vec<ConfiguredApiKey>,
}

/// Score aggregation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Version tag stamped on every stored score.
    pub algorithm_version: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            algorithm_version: "1.0.0".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (REPUTATION__*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("database.url", "sqlite://reputation.db?mode=rwc")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("REPUTATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.algorithm_version, "1.0.0");
    }

    #[test]
    fn test_auth_disabled_by_default() {
        let config = AuthConfig::default();
        assert!(!config.enabled);
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_optional_sections_default() {
        let config: Config = ConfigLoader::builder()
            .set_default("server.host", "127.0.0.1")
            .unwrap()
            .set_default("server.port", 9000_i64)
            .unwrap()
            .set_default("database.url", "sqlite::memory:")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(!config.auth.enabled);
        assert_eq!(config.scoring.algorithm_version, "1.0.0");
    }
}
