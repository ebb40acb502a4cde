//! websch - frontier distribution engine for distributed web fetchers
//!
//! Decides which hostnames and URLs each fetcher of a crawling fleet works on
//! next, without two fetchers ever crawling the same hostname at once.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading and validation
//! - [`frontier`] - Leases, partitioning, prioritization, assembly, statistics
//! - [`storage`] - Persistent store (SQLite) and in-memory store
//! - [`models`] - Core data structures and types
//! - [`generator`] - Synthetic fleet generator for development
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use websch::config::FrontierConfig;
//! use websch::frontier::{FrontierAssembler, PartitionMode};
//! use websch::models::FrontierRequest;
//! use websch::storage::create_sqlite_store;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = FrontierConfig::default();
//!     let store = create_sqlite_store("data/frontier.db", config.hash_buckets)?;
//!     let assembler = FrontierAssembler::new(store, config);
//!     let request = FrontierRequest::new("fetcher-id")
//!         .amount(10)
//!         .partition(PartitionMode::ConsistentHashRing);
//!     let response = assembler.build_frontier(&request)?;
//!     println!("{} hostnames leased", response.batch_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod frontier;
pub mod generator;
pub mod metrics;
pub mod models;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, FrontierConfig};
    pub use crate::error::{Error, ErrorCategory, Result, WebschErrorTrait};
    pub use crate::frontier::{
        fleet_statistics, FleetStatistics, FrontierAssembler, FrontierError, LongTermPriority,
        PartitionMode, ShortTermPriority,
    };
    pub use crate::models::{
        Fetcher, FrontierRequest, FrontierResponse, HostnameBatch, HostnameRecord, UrlRecord,
    };
    pub use crate::storage::{FrontierStore, SharedFrontierStore};
}

pub use frontier::FrontierAssembler;
pub use models::{FrontierRequest, FrontierResponse};
