//! Synthetic fleet generator
//!
//! Populates a store with fetchers, hostnames, URLs and reference edges so
//! the engine can be exercised without a real crawl. After generation the
//! hostname buckets are recomputed for the generated fleet size, which is
//! what hash-bucket partitioning expects.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::Result;
use crate::models::{Fetcher, HostnameRecord, UrlRecord, UrlReference};
use crate::storage::FrontierStore;

const TLDS: &[&str] = &["com", "de", "org", "net", "fr", "io"];

/// Oldest synthetic visit, relative to generation time
const MAX_VISIT_AGE_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Wipe the store first
    pub reset: bool,
    pub fetchers: usize,
    pub hostnames: usize,
    pub min_urls: usize,
    pub max_urls: usize,
    /// Share of URLs given a last-visited timestamp, in [0, 1]
    pub visited_ratio: f64,
    /// Random reference edges between generated URLs
    pub references: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            reset: true,
            fetchers: 3,
            hostnames: 20,
            min_urls: 10,
            max_urls: 100,
            visited_ratio: 1.0,
            references: 0,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.min_urls > self.max_urls {
            return Err(ConfigError::invalid(
                "min_urls",
                format!("{} exceeds max_urls {}", self.min_urls, self.max_urls),
            ));
        }
        if !(0.0..=1.0).contains(&self.visited_ratio) {
            return Err(ConfigError::invalid(
                "visited_ratio",
                "Must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

/// What a generation run wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateReport {
    pub fetcher_ids: Vec<String>,
    pub hostnames: usize,
    pub urls: usize,
    pub visited_urls: usize,
    pub references: usize,
    pub bucket_count: u32,
}

/// Populate `store` according to `options`
pub fn generate<S, R>(
    store: &S,
    options: &GenerateOptions,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<GenerateReport>
where
    S: FrontierStore + ?Sized,
    R: Rng + ?Sized,
{
    options.validate()?;

    if options.reset {
        store.clear()?;
        tracing::info!("Store cleared before generation");
    }

    let mut report = GenerateReport::default();

    for i in 0..options.fetchers {
        let fetcher = Fetcher::new(format!("fetcher{i}@example.org"), format!("fetcher-{i}"))
            .with_registered_at(now + Duration::milliseconds(i as i64))
            .with_tld_preference(TLDS[i % TLDS.len()]);
        store.upsert_fetcher(&fetcher)?;
        report.fetcher_ids.push(fetcher.id);
    }

    let mut all_urls: Vec<String> = Vec::new();
    for i in 0..options.hostnames {
        let tld = TLDS.choose(rng).copied().unwrap_or("com");
        let hostname = format!("site{i:04}.example.{tld}");
        let record = HostnameRecord::new(&hostname, store.bucket_count()?)
            .with_crawl_delay(rng.gen_range(1..=5));
        store.upsert_hostname(&record)?;
        report.hostnames += 1;

        let url_count = rng.gen_range(options.min_urls..=options.max_urls);
        for j in 0..url_count {
            let mut url = UrlRecord::discovered(&format!("http://{hostname}/page/{j}"), now)?
                .with_pagerank(rng.gen::<f64>());
            if rng.gen_bool(options.visited_ratio) {
                let age = rng.gen_range(0..MAX_VISIT_AGE_SECS);
                url = url.visited_at(now - Duration::seconds(age));
                report.visited_urls += 1;
            }
            store.upsert_url(&url)?;
            all_urls.push(url.url);
            report.urls += 1;
        }
    }

    if all_urls.len() > 1 {
        for _ in 0..options.references {
            let pair: Vec<&String> = all_urls.choose_multiple(rng, 2).collect();
            let reference = UrlReference {
                source_url: pair[0].clone(),
                target_url: pair[1].clone(),
                observed_at: now,
            };
            if store.add_reference(&reference)? {
                report.references += 1;
            }
        }
    }

    // one bucket per fetcher in the directory, including ones kept from before
    let fleet_size = store.count_fetchers()?.max(1);
    report.bucket_count = u32::try_from(fleet_size).unwrap_or(u32::MAX);
    store.rebucket_hostnames(report.bucket_count)?;

    tracing::info!(
        fetchers = report.fetcher_ids.len(),
        hostnames = report.hostnames,
        urls = report.urls,
        visited = report.visited_urls,
        references = report.references,
        "Synthetic fleet generated"
    );

    Ok(report)
}
