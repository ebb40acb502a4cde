//! Fleet-wide statistics
//!
//! A read-mostly snapshot for operators: how big the fleet and the URL
//! space are, how fresh the crawl is, and how evenly hostnames spread over
//! the hash buckets. Expired leases are purged first so the active-lease
//! count reflects reality.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::frontier::lease::LeaseLedger;
use crate::metrics;
use crate::storage::{FrontierStore, StorageResult};

/// Share of URLs visited at least once
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisitedRatio {
    Ratio(f64),
    /// There are no URLs to divide by
    Undefined,
}

impl VisitedRatio {
    pub fn from_counts(visited: u64, total: u64) -> Self {
        if total == 0 {
            Self::Undefined
        } else {
            Self::Ratio(visited as f64 / total as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Ratio(r) => Some(r),
            Self::Undefined => None,
        }
    }
}

impl Serialize for VisitedRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Ratio(r) => serializer.serialize_f64(*r),
            Self::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetStatistics {
    pub fetcher_count: u64,
    pub hostname_count: u64,
    pub url_count: u64,
    pub reference_count: u64,
    pub active_lease_count: usize,
    /// Mean of all known last-visited timestamps
    pub average_freshness: Option<DateTime<Utc>>,
    pub visited_ratio: VisitedRatio,
    /// Relative spread of hostnames across non-empty hash buckets
    pub partition_skew: f64,
    pub generated_at: DateTime<Utc>,
}

/// `((max - min) / 2) / mean` over the given bucket sizes, to two decimals.
///
/// Callers pass only non-empty buckets; no buckets yields 0.0.
pub fn partition_skew(counts: &[u64]) -> f64 {
    let (Some(max), Some(min)) = (counts.iter().max(), counts.iter().min()) else {
        return 0.0;
    };
    let mean = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let skew = ((max - min) as f64 / 2.0) / mean;
    (skew * 100.0).round() / 100.0
}

/// Compute a statistics snapshot at `now`
pub fn fleet_statistics<S: FrontierStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
) -> StorageResult<FleetStatistics> {
    let ledger = LeaseLedger::new(store);
    ledger.purge_expired(now)?;
    let active_lease_count = store.active_leases(None, now)?.len();

    let summary = store.visit_summary()?;
    let bucket_sizes: Vec<u64> = store
        .bucket_counts()?
        .into_iter()
        .map(|(_, count)| count)
        .filter(|count| *count > 0)
        .collect();

    let stats = FleetStatistics {
        fetcher_count: store.count_fetchers()?,
        hostname_count: store.count_hostnames()?,
        url_count: summary.total_urls,
        reference_count: store.count_references()?,
        active_lease_count,
        average_freshness: summary.average_last_visited,
        visited_ratio: VisitedRatio::from_counts(summary.visited_urls, summary.total_urls),
        partition_skew: partition_skew(&bucket_sizes),
        generated_at: now,
    };

    metrics::update_fleet_metrics(
        stats.fetcher_count,
        stats.hostname_count,
        stats.url_count,
        stats.active_lease_count,
        stats.visited_ratio.value(),
        stats.partition_skew,
    );
    tracing::debug!(
        fetchers = stats.fetcher_count,
        hostnames = stats.hostname_count,
        urls = stats.url_count,
        active_leases = stats.active_lease_count,
        skew = stats.partition_skew,
        "Fleet statistics computed"
    );

    Ok(stats)
}
