//! In-memory implementation of [`FrontierStore`]
//!
//! Useful for tests and fleet simulations without a database file. All
//! state sits behind one `RwLock`, so every write (including the lease
//! check-and-set) is atomic with respect to other callers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::error::{StorageError, StorageResult};
use super::repository::{FrontierStore, VisitSummary, DEFAULT_HASH_BUCKETS};
use crate::models::{
    bucket_of, Fetcher, HostnameRecord, Lease, LeaseOutcome, UrlRecord, UrlReference,
};

#[derive(Default)]
struct MemoryState {
    fetchers: HashMap<String, Fetcher>,
    hostnames: BTreeMap<String, HostnameRecord>,
    urls: BTreeMap<String, UrlRecord>,
    urls_by_hostname: HashMap<String, BTreeSet<String>>,
    references: HashSet<UrlReference>,
    leases: Vec<Lease>,
    /// Set on first hostname creation or by a rebucket
    bucket_count: Option<u32>,
}

impl MemoryState {
    fn member_urls<'a>(&'a self, hostname: &str) -> impl Iterator<Item = &'a UrlRecord> + 'a {
        self.urls_by_hostname
            .get(hostname)
            .into_iter()
            .flatten()
            .filter_map(move |url| self.urls.get(url))
    }

    fn refresh_aggregates(&mut self, hostname: &str) {
        let members: Vec<&UrlRecord> = self.member_urls(hostname).collect();

        let url_count = members.len() as u64;
        let avg_pagerank = if members.is_empty() {
            0.0
        } else {
            members.iter().map(|u| u.pagerank).sum::<f64>() / members.len() as f64
        };
        let avg_last_visited = mean_timestamp(members.iter().filter_map(|u| u.last_visited));

        if let Some(record) = self.hostnames.get_mut(hostname) {
            record.url_count = url_count;
            record.avg_pagerank = avg_pagerank;
            record.avg_last_visited = avg_last_visited;
        }
    }

    fn active_holder(&self, hostname: &str, now: DateTime<Utc>) -> Option<&str> {
        self.leases
            .iter()
            .filter(|l| l.hostname == hostname && l.is_active(now))
            .max_by_key(|l| l.expires_at)
            .map(|l| l.fetcher_id.as_str())
    }
}

/// Mean of millisecond timestamps, rounded the same way the SQLite store rounds
fn mean_timestamp(values: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    let millis: Vec<i64> = values.map(|v| v.timestamp_millis()).collect();
    if millis.is_empty() {
        return None;
    }
    let mean = millis.iter().map(|m| *m as f64).sum::<f64>() / millis.len() as f64;
    DateTime::from_timestamp_millis(mean.round() as i64)
}

/// Store that keeps everything in process memory
pub struct MemoryFrontierStore {
    state: RwLock<MemoryState>,
    default_bucket_count: u32,
}

impl MemoryFrontierStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            default_bucket_count: DEFAULT_HASH_BUCKETS,
        }
    }

    /// Bucket count to pin when the first hostname is stored
    pub fn with_bucket_count(mut self, bucket_count: u32) -> Self {
        self.default_bucket_count = bucket_count;
        self
    }

    /// Number of lease rows, including inert expired ones
    pub fn lease_rows(&self) -> StorageResult<usize> {
        Ok(self.read()?.leases.len())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory store"))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StorageError::LockPoisoned("memory store"))
    }
}

impl Default for MemoryFrontierStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontierStore for MemoryFrontierStore {
    fn bucket_count(&self) -> StorageResult<u32> {
        Ok(self.read()?.bucket_count.unwrap_or(self.default_bucket_count))
    }

    fn upsert_fetcher(&self, fetcher: &Fetcher) -> StorageResult<()> {
        self.write()?
            .fetchers
            .insert(fetcher.id.clone(), fetcher.clone());
        Ok(())
    }

    fn get_fetcher(&self, id: &str) -> StorageResult<Option<Fetcher>> {
        Ok(self.read()?.fetchers.get(id).cloned())
    }

    fn fetchers_by_registration(&self) -> StorageResult<Vec<Fetcher>> {
        let mut fetchers: Vec<Fetcher> = self.read()?.fetchers.values().cloned().collect();
        fetchers.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(fetchers)
    }

    fn count_fetchers(&self) -> StorageResult<u64> {
        Ok(self.read()?.fetchers.len() as u64)
    }

    fn upsert_hostname(&self, record: &HostnameRecord) -> StorageResult<()> {
        let mut state = self.write()?;
        let bucket_count = *state.bucket_count.get_or_insert(self.default_bucket_count);
        let entry = state
            .hostnames
            .entry(record.hostname.clone())
            .or_insert_with(|| record.clone());
        entry.tld = record.tld.clone();
        entry.last_ipv4 = record.last_ipv4.clone();
        entry.last_ipv6 = record.last_ipv6.clone();
        entry.crawl_delay_secs = record.crawl_delay_secs;
        entry.fqdn_hash = record.fqdn_hash;
        entry.hash_bucket = bucket_of(record.fqdn_hash, bucket_count);
        state.refresh_aggregates(&record.hostname);
        Ok(())
    }

    fn get_hostname(&self, hostname: &str) -> StorageResult<Option<HostnameRecord>> {
        Ok(self.read()?.hostnames.get(hostname).cloned())
    }

    fn hostnames(&self) -> StorageResult<Vec<HostnameRecord>> {
        Ok(self.read()?.hostnames.values().cloned().collect())
    }

    fn count_hostnames(&self) -> StorageResult<u64> {
        Ok(self.read()?.hostnames.len() as u64)
    }

    fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()> {
        let mut state = self.write()?;
        let bucket_count = *state.bucket_count.get_or_insert(self.default_bucket_count);
        let host = HostnameRecord::new(record.hostname.clone(), bucket_count);
        let hostname = host.hostname.clone();
        state.hostnames.entry(hostname.clone()).or_insert(host);

        match state.urls.get_mut(&record.url) {
            Some(existing) => {
                existing.last_visited = record.last_visited;
                existing.pagerank = record.pagerank;
                existing.blacklisted = record.blacklisted;
                existing.bot_excluded = record.bot_excluded;
            }
            None => {
                let mut inserted = record.clone();
                inserted.hostname = hostname.clone();
                state.urls.insert(record.url.clone(), inserted);
                state
                    .urls_by_hostname
                    .entry(hostname.clone())
                    .or_default()
                    .insert(record.url.clone());
            }
        }

        state.refresh_aggregates(&hostname);
        Ok(())
    }

    fn urls(&self, hostname: Option<&str>) -> StorageResult<Vec<UrlRecord>> {
        let state = self.read()?;
        let urls = match hostname {
            Some(hostname) => state.member_urls(hostname).cloned().collect(),
            None => state.urls.values().cloned().collect(),
        };
        Ok(urls)
    }

    fn count_urls(&self) -> StorageResult<u64> {
        Ok(self.read()?.urls.len() as u64)
    }

    fn visit_summary(&self) -> StorageResult<VisitSummary> {
        let state = self.read()?;
        let visited: Vec<DateTime<Utc>> =
            state.urls.values().filter_map(|u| u.last_visited).collect();

        Ok(VisitSummary {
            total_urls: state.urls.len() as u64,
            visited_urls: visited.len() as u64,
            average_last_visited: mean_timestamp(visited.into_iter()),
        })
    }

    fn bucket_counts(&self) -> StorageResult<Vec<(u32, u64)>> {
        let state = self.read()?;
        let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
        for record in state.hostnames.values() {
            *counts.entry(record.hash_bucket).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn rebucket_hostnames(&self, bucket_count: u32) -> StorageResult<usize> {
        let mut state = self.write()?;
        state.bucket_count = Some(bucket_count);
        for record in state.hostnames.values_mut() {
            record.hash_bucket = bucket_of(record.fqdn_hash, bucket_count);
        }
        Ok(state.hostnames.len())
    }

    fn purge_hostname(&self, hostname: &str) -> StorageResult<bool> {
        let mut state = self.write()?;
        let member_urls = state.urls_by_hostname.remove(hostname).unwrap_or_default();

        state
            .references
            .retain(|r| !member_urls.contains(&r.source_url) && !member_urls.contains(&r.target_url));
        state.urls.retain(|url, _| !member_urls.contains(url));
        state.leases.retain(|l| l.hostname != hostname);
        Ok(state.hostnames.remove(hostname).is_some())
    }

    fn add_reference(&self, reference: &UrlReference) -> StorageResult<bool> {
        Ok(self.write()?.references.insert(reference.clone()))
    }

    fn references_to(&self, target_url: &str, limit: usize) -> StorageResult<Vec<UrlReference>> {
        let state = self.read()?;
        let mut latest: HashMap<&str, &UrlReference> = HashMap::new();
        for reference in state.references.iter().filter(|r| r.target_url == target_url) {
            let entry = latest.entry(reference.source_url.as_str()).or_insert(reference);
            if reference.observed_at > entry.observed_at {
                *entry = reference;
            }
        }
        let mut references: Vec<UrlReference> = latest.into_values().cloned().collect();
        references.sort_by(|a, b| {
            b.observed_at
                .cmp(&a.observed_at)
                .then_with(|| a.source_url.cmp(&b.source_url))
        });
        references.truncate(limit);
        Ok(references)
    }

    fn count_references(&self) -> StorageResult<u64> {
        Ok(self.read()?.references.len() as u64)
    }

    fn purge_expired_leases(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut state = self.write()?;
        let before = state.leases.len();
        state.leases.retain(|l| l.is_active(now));
        Ok(before - state.leases.len())
    }

    fn active_leases(
        &self,
        fetcher_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Lease>> {
        let state = self.read()?;
        let mut leases: Vec<Lease> = state
            .leases
            .iter()
            .filter(|l| l.is_active(now))
            .filter(|l| fetcher_id.map_or(true, |id| l.fetcher_id == id))
            .cloned()
            .collect();
        leases.sort_by(|a, b| {
            a.hostname
                .cmp(&b.hostname)
                .then_with(|| a.expires_at.cmp(&b.expires_at))
        });
        Ok(leases)
    }

    fn record_leases(
        &self,
        fetcher_id: &str,
        hostnames: &[String],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<LeaseOutcome> {
        let mut outcome = LeaseOutcome::default();
        if hostnames.is_empty() {
            return Ok(outcome);
        }

        let mut state = self.write()?;
        let mut seen = HashSet::new();
        for hostname in hostnames {
            if !seen.insert(hostname.as_str()) {
                continue;
            }

            let holder = state.active_holder(hostname, now).map(str::to_owned);
            match holder {
                None => {
                    state.leases.push(Lease {
                        hostname: hostname.clone(),
                        fetcher_id: fetcher_id.to_string(),
                        expires_at,
                    });
                    outcome.granted.push(hostname.clone());
                }
                Some(holder) if holder == fetcher_id => outcome.retained.push(hostname.clone()),
                Some(_) => outcome.rejected.push(hostname.clone()),
            }
        }

        Ok(outcome)
    }

    fn clear(&self) -> StorageResult<()> {
        *self.write()? = MemoryState::default();
        Ok(())
    }
}
