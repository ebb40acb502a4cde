//! Test fixtures for integration tests
//!
//! Builders for fetchers, hostnames and stores shared by the frontier,
//! concurrency and error-scenario tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use websch::config::FrontierConfig;
use websch::frontier::FrontierAssembler;
use websch::models::{Fetcher, UrlRecord};
use websch::storage::{create_memory_store, FrontierStore, SharedFrontierStore, SqliteFrontierStore};

/// Lease duration used by test assemblers
pub const LEASE_SECS: i64 = 600;

/// Fixed instant `secs` seconds after the test epoch
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// One SQLite and one in-memory store, both with `buckets` hash buckets
pub fn create_test_stores(buckets: u32) -> Vec<SharedFrontierStore> {
    let sqlite: SharedFrontierStore = Arc::new(
        SqliteFrontierStore::in_memory()
            .unwrap()
            .with_bucket_count(buckets),
    );
    vec![sqlite, create_memory_store(buckets)]
}

/// Register a fetcher whose registration order follows `ordinal`
pub fn register(store: &dyn FrontierStore, id: &str, ordinal: i64) -> Fetcher {
    let fetcher = Fetcher::new(format!("{id}@example.org"), id)
        .with_id(id)
        .with_registered_at(t(ordinal));
    store.upsert_fetcher(&fetcher).unwrap();
    fetcher
}

/// Add `hostname` with `urls` never-visited URLs
pub fn add_host(store: &dyn FrontierStore, hostname: &str, urls: usize) {
    for i in 0..urls {
        let url = UrlRecord::discovered(&format!("http://{hostname}/page/{i}"), t(0)).unwrap();
        store.upsert_url(&url).unwrap();
    }
}

/// Add `count` hostnames named `host{i}.example.com` with `urls` URLs each
pub fn add_hosts(store: &dyn FrontierStore, count: usize, urls: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let hostname = format!("host{i:03}.example.com");
            add_host(store, &hostname, urls);
            hostname
        })
        .collect()
}

pub fn test_config() -> FrontierConfig {
    FrontierConfig::builder()
        .lease_duration_secs(LEASE_SECS as u64)
        .ring_virtual_nodes(32)
        .build()
        .unwrap()
}

pub fn assembler(store: &SharedFrontierStore) -> FrontierAssembler {
    FrontierAssembler::new(Arc::clone(store), test_config())
}
