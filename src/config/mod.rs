//! Configuration management for websch
//!
//! Configuration is loaded from environment variables or a TOML file and
//! validated before the store or the assembler are built.

pub mod frontier;

pub use frontier::{ConfigError, FrontierConfig, FrontierConfigBuilder};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Distribution settings
    pub frontier: FrontierConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/frontier.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from `WEBSCH_*` environment variables.
    ///
    /// Unset or unparseable variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = FrontierConfig::default();

        let frontier = FrontierConfig {
            lease_duration_secs: env_parse("WEBSCH_LEASE_DURATION_SECS")
                .unwrap_or(defaults.lease_duration_secs),
            default_crawl_delay_secs: env_parse("WEBSCH_DEFAULT_CRAWL_DELAY")
                .unwrap_or(defaults.default_crawl_delay_secs),
            hash_buckets: env_parse("WEBSCH_HASH_BUCKETS").unwrap_or(defaults.hash_buckets),
            ring_virtual_nodes: env_parse("WEBSCH_RING_VIRTUAL_NODES")
                .unwrap_or(defaults.ring_virtual_nodes),
            random_seed: env_parse("WEBSCH_RANDOM_SEED"),
            skip_excluded_urls: env_parse("WEBSCH_SKIP_EXCLUDED_URLS")
                .unwrap_or(defaults.skip_excluded_urls),
        };

        let sqlite_path = std::env::var("WEBSCH_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| DatabaseConfig::default().sqlite_path);

        let level = std::env::var("WEBSCH_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("WEBSCH_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            frontier,
            database: DatabaseConfig { sqlite_path },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a TOML file; missing sections use defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.frontier.validate()?;

        if self.database.sqlite_path.as_os_str().is_empty() {
            anyhow::bail!("sqlite_path must not be empty");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.logging.format);
        }

        Ok(())
    }
}
