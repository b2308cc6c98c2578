//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; every section carries serde
//! defaults so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::RangeToken;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Base URL of the portfolio backend REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "http://localhost:5000".into()
}

/// Freshness settings shared by the membership and detail caches.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum age in seconds at which a cached entry is still fresh.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Range the stock detail view resets to on every ticker change.
    #[serde(default)]
    pub default_range: RangeToken,
}

fn default_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            default_range: RangeToken::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;

        let mut config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;

        if let Ok(api_url) = std::env::var("CARTEIRA_API_URL") {
            config.network.api_url = api_url;
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.network.api_url.is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ttl_secs",
                reason: "TTL must be at least one second".into(),
            });
        }
        Ok(())
    }

    /// Cache TTL as a chrono duration.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.ttl_secs as i64)
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.default_range, RangeToken::ThreeMonths);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_ttl_rejected() {
        let config: Config = toml::from_str("[cache]\nttl_secs = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn custom_range_parsed() {
        let config: Config = toml::from_str("[cache]\ndefault_range = \"1y\"\n").unwrap();
        assert_eq!(config.cache.default_range, RangeToken::OneYear);
    }
}
