//! Frontier engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::frontier::partition::DEFAULT_VIRTUAL_NODES;
use crate::storage::DEFAULT_HASH_BUCKETS;

/// Default lease duration (one hour)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 3600;

/// Crawl delay reported for hostnames without their own
pub const DEFAULT_CRAWL_DELAY_SECS: u32 = 1;

/// Immutable settings threaded into the assembler at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// How long a hostname stays checked out to a fetcher
    pub lease_duration_secs: u64,

    /// Crawl delay for hostnames that carry none
    pub default_crawl_delay_secs: u32,

    /// Bucket count used when new hostnames are stored
    pub hash_buckets: u32,

    /// Ring tokens per fetcher for consistent-hash partitioning
    pub ring_virtual_nodes: u32,

    /// Seed for random orderings; fresh entropy per request when unset
    pub random_seed: Option<u64>,

    /// Leave blacklisted and robots-excluded URLs out of batches
    pub skip_excluded_urls: bool,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            lease_duration_secs: DEFAULT_LEASE_DURATION_SECS,
            default_crawl_delay_secs: DEFAULT_CRAWL_DELAY_SECS,
            hash_buckets: DEFAULT_HASH_BUCKETS,
            ring_virtual_nodes: DEFAULT_VIRTUAL_NODES,
            random_seed: None,
            skip_excluded_urls: true,
        }
    }
}

impl FrontierConfig {
    pub fn builder() -> FrontierConfigBuilder {
        FrontierConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_duration_secs == 0 {
            return Err(ConfigError::invalid(
                "lease_duration_secs",
                "Lease duration must be at least one second",
            ));
        }

        if self.hash_buckets == 0 {
            return Err(ConfigError::invalid(
                "hash_buckets",
                "At least one hash bucket is required",
            ));
        }

        if self.ring_virtual_nodes == 0 {
            return Err(ConfigError::invalid(
                "ring_virtual_nodes",
                "Each fetcher needs at least one ring token",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}

/// Builder for [`FrontierConfig`]
#[derive(Debug, Default)]
pub struct FrontierConfigBuilder {
    lease_duration_secs: Option<u64>,
    default_crawl_delay_secs: Option<u32>,
    hash_buckets: Option<u32>,
    ring_virtual_nodes: Option<u32>,
    random_seed: Option<u64>,
    skip_excluded_urls: Option<bool>,
}

impl FrontierConfigBuilder {
    pub fn lease_duration_secs(mut self, secs: u64) -> Self {
        self.lease_duration_secs = Some(secs);
        self
    }

    pub fn default_crawl_delay_secs(mut self, secs: u32) -> Self {
        self.default_crawl_delay_secs = Some(secs);
        self
    }

    pub fn hash_buckets(mut self, buckets: u32) -> Self {
        self.hash_buckets = Some(buckets);
        self
    }

    pub fn ring_virtual_nodes(mut self, nodes: u32) -> Self {
        self.ring_virtual_nodes = Some(nodes);
        self
    }

    /// Fix the RNG seed so random orderings are reproducible
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn skip_excluded_urls(mut self, skip: bool) -> Self {
        self.skip_excluded_urls = Some(skip);
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<FrontierConfig, ConfigError> {
        let defaults = FrontierConfig::default();
        let config = FrontierConfig {
            lease_duration_secs: self.lease_duration_secs.unwrap_or(defaults.lease_duration_secs),
            default_crawl_delay_secs: self
                .default_crawl_delay_secs
                .unwrap_or(defaults.default_crawl_delay_secs),
            hash_buckets: self.hash_buckets.unwrap_or(defaults.hash_buckets),
            ring_virtual_nodes: self.ring_virtual_nodes.unwrap_or(defaults.ring_virtual_nodes),
            random_seed: self.random_seed,
            skip_excluded_urls: self.skip_excluded_urls.unwrap_or(defaults.skip_excluded_urls),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
