// Core data structures for the frontier engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::frontier::partition::PartitionMode;
use crate::frontier::priority::{LongTermPriority, ShortTermPriority};
use crate::storage::{StorageError, StorageResult};

/// Deterministic 64-bit hash used for bucket and ring placement.
///
/// Takes the first eight bytes of the SHA-256 digest, so the value is the
/// same in every process and on every platform.
pub fn stable_hash(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Top-level domain of a hostname ("www.example.de" -> "de")
pub fn tld_of(hostname: &str) -> String {
    hostname
        .trim_end_matches('.')
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

// ============================================================================
// Fetcher Identity
// ============================================================================

/// A registered crawling agent, as read from the fetcher directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetcher {
    pub id: String,
    pub contact: String,
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub location: Option<String>,
    pub tld_preference: Option<String>,
}

impl Fetcher {
    /// Create a fetcher with a fresh UUID, registered now
    pub fn new(contact: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contact: contact.into(),
            name: name.into(),
            registered_at: Utc::now(),
            location: None,
            tld_preference: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_registered_at(mut self, at: DateTime<Utc>) -> Self {
        self.registered_at = at;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_tld_preference(mut self, tld: impl Into<String>) -> Self {
        self.tld_preference = Some(tld.into().to_lowercase());
        self
    }
}

// ============================================================================
// Hostname / URL Records
// ============================================================================

/// One record per distinct hostname ever seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameRecord {
    pub hostname: String,
    pub tld: String,
    pub last_ipv4: Option<String>,
    pub last_ipv6: Option<String>,
    /// Number of known URLs (derived)
    pub url_count: u64,
    /// Mean pagerank of member URLs (derived)
    pub avg_pagerank: f64,
    pub crawl_delay_secs: Option<u32>,
    pub fqdn_hash: u64,
    pub hash_bucket: u32,
    /// Mean last-visited timestamp of visited member URLs (derived)
    pub avg_last_visited: Option<DateTime<Utc>>,
}

impl HostnameRecord {
    /// Create a fresh record; the bucket index is fixed at this point
    pub fn new(hostname: impl Into<String>, bucket_count: u32) -> Self {
        let hostname = hostname.into().to_lowercase();
        let fqdn_hash = stable_hash(&hostname);
        Self {
            tld: tld_of(&hostname),
            fqdn_hash,
            hash_bucket: bucket_of(fqdn_hash, bucket_count),
            hostname,
            last_ipv4: None,
            last_ipv6: None,
            url_count: 0,
            avg_pagerank: 0.0,
            crawl_delay_secs: None,
            avg_last_visited: None,
        }
    }

    pub fn with_crawl_delay(mut self, secs: u32) -> Self {
        self.crawl_delay_secs = Some(secs);
        self
    }

    pub fn with_addresses(mut self, ipv4: Option<String>, ipv6: Option<String>) -> Self {
        self.last_ipv4 = ipv4;
        self.last_ipv6 = ipv6;
        self
    }
}

/// Bucket index for a hash; a zero bucket count collapses to bucket 0
pub fn bucket_of(hash: u64, bucket_count: u32) -> u32 {
    if bucket_count == 0 {
        return 0;
    }
    (hash % u64::from(bucket_count)) as u32
}

/// One record per distinct URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub hostname: String,
    pub discovered_at: DateTime<Utc>,
    pub last_visited: Option<DateTime<Utc>>,
    pub pagerank: f64,
    pub blacklisted: bool,
    pub bot_excluded: bool,
}

impl UrlRecord {
    /// Build a never-visited record from a raw URL string.
    ///
    /// The hostname is taken from the parsed URL.
    pub fn discovered(raw: &str, at: DateTime<Utc>) -> StorageResult<Self> {
        let parsed = url::Url::parse(raw).map_err(|e| StorageError::invalid_record("url", e))?;
        let hostname = parsed
            .host_str()
            .ok_or_else(|| StorageError::invalid_record("url", format!("no host in '{raw}'")))?
            .to_lowercase();

        Ok(Self {
            url: parsed.to_string(),
            hostname,
            discovered_at: at,
            last_visited: None,
            pagerank: 0.0,
            blacklisted: false,
            bot_excluded: false,
        })
    }

    pub fn visited_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_visited = Some(at);
        self
    }

    pub fn with_pagerank(mut self, pagerank: f64) -> Self {
        self.pagerank = pagerank;
        self
    }

    /// Whether the record must never be handed to a fetcher
    pub fn is_excluded(&self) -> bool {
        self.blacklisted || self.bot_excluded
    }
}

/// Hyperlink observed from `source_url` to `target_url`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlReference {
    pub source_url: String,
    pub target_url: String,
    pub observed_at: DateTime<Utc>,
}

// ============================================================================
// Leases
// ============================================================================

/// A hostname checked out to one fetcher until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub hostname: String,
    pub fetcher_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Result of a conditional lease write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOutcome {
    /// Newly inserted with the requested expiry
    pub granted: Vec<String>,
    /// Already actively held by the same fetcher, left untouched
    pub retained: Vec<String>,
    /// Actively held by another fetcher, not written
    pub rejected: Vec<String>,
}

impl LeaseOutcome {
    /// Hostnames the fetcher holds after the write
    pub fn held(&self) -> impl Iterator<Item = &String> {
        self.granted.iter().chain(self.retained.iter())
    }

    pub fn has_contention(&self) -> bool {
        !self.rejected.is_empty()
    }
}

// ============================================================================
// Frontier Request / Response
// ============================================================================

/// Request for a batch of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierRequest {
    pub fetcher_id: String,
    /// Hostname batches to return; 0 or less means unbounded
    #[serde(default)]
    pub amount: i64,
    /// URLs per hostname; 0 or less means unbounded
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub partition: PartitionMode,
    #[serde(default)]
    pub long_term: LongTermPriority,
    #[serde(default)]
    pub short_term: ShortTermPriority,
}

impl FrontierRequest {
    pub fn new(fetcher_id: impl Into<String>) -> Self {
        Self {
            fetcher_id: fetcher_id.into(),
            amount: 0,
            length: 0,
            partition: PartitionMode::default(),
            long_term: LongTermPriority::default(),
            short_term: ShortTermPriority::default(),
        }
    }

    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    pub fn length(mut self, length: i64) -> Self {
        self.length = length;
        self
    }

    pub fn partition(mut self, mode: PartitionMode) -> Self {
        self.partition = mode;
        self
    }

    pub fn long_term(mut self, priority: LongTermPriority) -> Self {
        self.long_term = priority;
        self
    }

    pub fn short_term(mut self, priority: ShortTermPriority) -> Self {
        self.short_term = priority;
        self
    }
}

/// Work for one hostname: its metadata plus the ordered, capped URL list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameBatch {
    pub hostname: String,
    pub tld: String,
    pub last_ipv4: Option<String>,
    pub last_ipv6: Option<String>,
    pub avg_pagerank: f64,
    pub crawl_delay_secs: u32,
    /// Number of URLs in this batch
    pub url_count: u64,
    pub urls: Vec<UrlRecord>,
}

impl HostnameBatch {
    /// Package a hostname with its URL slice; missing crawl delay falls back to the default
    pub fn new(record: &HostnameRecord, urls: Vec<UrlRecord>, default_crawl_delay: u32) -> Self {
        Self {
            hostname: record.hostname.clone(),
            tld: record.tld.clone(),
            last_ipv4: record.last_ipv4.clone(),
            last_ipv6: record.last_ipv6.clone(),
            avg_pagerank: record.avg_pagerank,
            crawl_delay_secs: record.crawl_delay_secs.unwrap_or(default_crawl_delay),
            url_count: urls.len() as u64,
            urls,
        }
    }
}

/// Composed batch returned to a fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierResponse {
    pub fetcher_id: String,
    pub partition: PartitionMode,
    pub long_term: LongTermPriority,
    pub short_term: ShortTermPriority,
    pub amount: i64,
    pub length: i64,
    pub batch_count: usize,
    pub url_count: usize,
    pub batches: Vec<HostnameBatch>,
    pub lease_expires_at: DateTime<Utc>,
}

impl FrontierResponse {
    /// Hostnames in response order
    pub fn hostnames(&self) -> Vec<&str> {
        self.batches.iter().map(|b| b.hostname.as_str()).collect()
    }

    /// All URLs across batches, in response order
    pub fn url_list(&self) -> Vec<&str> {
        self.batches
            .iter()
            .flat_map(|b| b.urls.iter().map(|u| u.url.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
