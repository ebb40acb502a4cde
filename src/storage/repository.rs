//! Repository abstraction over the shared frontier store
//!
//! The frontier engine keeps no coordination state of its own: fetchers,
//! hostnames, URLs, references and leases all live behind [`FrontierStore`].
//! The store is the single synchronization point between concurrently
//! running requests, so every multi-row write it exposes is atomic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Frontier engine (ledger, strategies, assembler)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     FrontierStore trait                     │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                             │
//!                  ▼                             ▼
//!        ┌──────────────────┐          ┌──────────────────┐
//!        │      SQLite      │          │    In-memory     │
//!        │  Implementation  │          │  Implementation  │
//!        └──────────────────┘          └──────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageResult;
use super::memory::MemoryFrontierStore;
use super::sqlite::SqliteFrontierStore;
use crate::models::{Fetcher, HostnameRecord, Lease, LeaseOutcome, UrlRecord, UrlReference};

/// Bucket count used when a store is opened without an explicit one
pub const DEFAULT_HASH_BUCKETS: u32 = 16;

/// Aggregate view over the URL table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitSummary {
    pub total_urls: u64,
    pub visited_urls: u64,
    /// Mean of all non-null last-visited timestamps
    pub average_last_visited: Option<DateTime<Utc>>,
}

/// Persistent store consumed by the frontier engine
///
/// Listing methods return rows in a stable storage order (hostname or URL
/// ascending) so strategy tie-breaks are deterministic within one call.
pub trait FrontierStore: Send + Sync {
    /// Bucket space shared by every stored hostname.
    ///
    /// Pinned to the store's configured count when the first hostname is
    /// stored and changed only by [`FrontierStore::rebucket_hostnames`].
    /// Hostnames created later are bucketed against the same count, so a
    /// record's own `hash_bucket` is ignored on upsert.
    fn bucket_count(&self) -> StorageResult<u32>;

    // ------------------------------------------------------------------
    // Fetcher directory
    // ------------------------------------------------------------------

    /// Insert or replace a fetcher record
    fn upsert_fetcher(&self, fetcher: &Fetcher) -> StorageResult<()>;

    /// Look up a fetcher by id
    fn get_fetcher(&self, id: &str) -> StorageResult<Option<Fetcher>>;

    /// All fetchers ordered by registration time, ties broken by id
    fn fetchers_by_registration(&self) -> StorageResult<Vec<Fetcher>>;

    fn count_fetchers(&self) -> StorageResult<u64>;

    // ------------------------------------------------------------------
    // Hostnames and URLs
    // ------------------------------------------------------------------

    /// Insert or update hostname metadata; derived aggregates are recomputed
    fn upsert_hostname(&self, record: &HostnameRecord) -> StorageResult<()>;

    fn get_hostname(&self, hostname: &str) -> StorageResult<Option<HostnameRecord>>;

    /// All hostnames, ordered by hostname
    fn hostnames(&self) -> StorageResult<Vec<HostnameRecord>>;

    fn count_hostnames(&self) -> StorageResult<u64>;

    /// Insert or update a URL, creating its hostname on first discovery and
    /// refreshing the hostname aggregates in the same write
    fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()>;

    /// URLs ordered by URL, optionally restricted to one hostname
    fn urls(&self, hostname: Option<&str>) -> StorageResult<Vec<UrlRecord>>;

    fn count_urls(&self) -> StorageResult<u64>;

    /// Counts and mean last-visited time over all URLs
    fn visit_summary(&self) -> StorageResult<VisitSummary>;

    /// Hostname counts per hash bucket, ordered by bucket; empty buckets are absent
    fn bucket_counts(&self) -> StorageResult<Vec<(u32, u64)>>;

    /// Move the store to a new bucket space, recomputing every hostname's bucket
    fn rebucket_hostnames(&self, bucket_count: u32) -> StorageResult<usize>;

    /// Administrative purge of a hostname with its URLs, references and leases
    fn purge_hostname(&self, hostname: &str) -> StorageResult<bool>;

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// Append a reference edge; returns false if the exact edge already exists
    fn add_reference(&self, reference: &UrlReference) -> StorageResult<bool>;

    /// Newest edge from each distinct source pointing at `target_url`,
    /// newest first
    fn references_to(&self, target_url: &str, limit: usize) -> StorageResult<Vec<UrlReference>>;

    fn count_references(&self) -> StorageResult<u64>;

    // ------------------------------------------------------------------
    // Leases
    // ------------------------------------------------------------------

    /// Delete every lease with `expires_at <= now`; returns rows removed
    fn purge_expired_leases(&self, now: DateTime<Utc>) -> StorageResult<usize>;

    /// Leases with `expires_at > now`, optionally for one fetcher
    fn active_leases(&self, fetcher_id: Option<&str>, now: DateTime<Utc>)
        -> StorageResult<Vec<Lease>>;

    /// Conditionally lease `hostnames` to `fetcher_id`.
    ///
    /// Runs as one atomic check-and-set: hostnames free at `now` are
    /// inserted with `expires_at`, hostnames the fetcher already holds are
    /// left untouched, hostnames held by another fetcher are rejected.
    fn record_leases(
        &self,
        fetcher_id: &str,
        hostnames: &[String],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<LeaseOutcome>;

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Remove all rows from every table
    fn clear(&self) -> StorageResult<()>;
}

// ============================================================================
// Shared Store Types
// ============================================================================

/// Thread-safe shared store handle
pub type SharedFrontierStore = Arc<dyn FrontierStore>;

/// Open a shared SQLite store at `path`
pub fn create_sqlite_store(path: impl AsRef<Path>, bucket_count: u32) -> StorageResult<SharedFrontierStore> {
    let store = SqliteFrontierStore::open(path)?.with_bucket_count(bucket_count);
    Ok(Arc::new(store))
}

/// Create a shared in-memory store
pub fn create_memory_store(bucket_count: u32) -> SharedFrontierStore {
    Arc::new(MemoryFrontierStore::new().with_bucket_count(bucket_count))
}

// ============================================================================
// Tests
// ============================================================================
