//! Persistent store for fetchers, hostnames, URLs, references and leases
//!
//! The store is the only shared mutable resource of the frontier engine.
//! [`SqliteFrontierStore`] is the production backend; [`MemoryFrontierStore`]
//! backs tests and simulations.

pub mod error;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryFrontierStore;
pub use repository::{
    create_memory_store, create_sqlite_store, FrontierStore, SharedFrontierStore, VisitSummary,
    DEFAULT_HASH_BUCKETS,
};
pub use sqlite::SqliteFrontierStore;
