use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use websch::config::Config;
use websch::frontier::LeaseLedger;
use websch::models::{Fetcher, UrlRecord};

use super::{open_store, print_json};

pub fn init(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    tracing::info!(path = %config.database.sqlite_path.display(), "Database initialized");
    print_json(&json!({
        "database": config.database.sqlite_path,
        "hash_buckets": store.bucket_count()?,
        "fetchers": store.count_fetchers()?,
        "hostnames": store.count_hostnames()?,
    }))
}

/// Parameters for registering a fetcher
pub struct RegisterParams {
    pub contact: String,
    pub name: String,
    pub id: Option<String>,
    pub location: Option<String>,
    pub tld: Option<String>,
}

pub fn register(config: &Config, params: RegisterParams) -> Result<()> {
    let store = open_store(config)?;

    let mut fetcher = Fetcher::new(params.contact, params.name);
    if let Some(id) = params.id {
        fetcher = fetcher.with_id(id);
    }
    if let Some(location) = params.location {
        fetcher = fetcher.with_location(location);
    }
    if let Some(tld) = params.tld {
        fetcher = fetcher.with_tld_preference(tld);
    }

    store.upsert_fetcher(&fetcher)?;
    tracing::info!(fetcher_id = %fetcher.id, name = %fetcher.name, "Fetcher registered");
    print_json(&fetcher)
}

pub fn add_url(config: &Config, url: &str, pagerank: f64, visited: bool) -> Result<()> {
    let store = open_store(config)?;
    let now = Utc::now();

    let mut record = UrlRecord::discovered(url, now)
        .with_context(|| format!("Invalid URL: {url}"))?
        .with_pagerank(pagerank);
    if visited {
        record = record.visited_at(now);
    }
    store.upsert_url(&record)?;

    let hostname = store.get_hostname(&record.hostname)?;
    print_json(&json!({ "url": record, "hostname": hostname }))
}

pub fn purge_leases(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let now = Utc::now();
    let ledger = LeaseLedger::new(store.as_ref());
    let purged = ledger.purge_expired(now)?;
    let active = store.active_leases(None, now)?;

    tracing::info!(purged, active = active.len(), "Expired leases purged");
    print_json(&json!({ "purged": purged, "active": active }))
}
