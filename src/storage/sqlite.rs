//! SQLite implementation of [`FrontierStore`]
//!
//! Timestamps are stored as integer milliseconds since the epoch so that
//! expiry comparisons and averages are plain integer arithmetic in SQL.
//! Hashes are stored as the bit-identical `i64`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::error::{StorageError, StorageResult};
use super::repository::{FrontierStore, VisitSummary, DEFAULT_HASH_BUCKETS};
use crate::models::{
    bucket_of, Fetcher, HostnameRecord, Lease, LeaseOutcome, UrlRecord, UrlReference,
};

const BUCKET_COUNT_KEY: &str = "bucket_count";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS fetchers (
        id TEXT PRIMARY KEY,
        contact TEXT NOT NULL,
        name TEXT NOT NULL,
        registered_at INTEGER NOT NULL,
        location TEXT,
        tld_preference TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_fetchers_registered_at
        ON fetchers(registered_at);

    CREATE TABLE IF NOT EXISTS hostnames (
        hostname TEXT PRIMARY KEY,
        tld TEXT NOT NULL,
        last_ipv4 TEXT,
        last_ipv6 TEXT,
        url_count INTEGER NOT NULL DEFAULT 0,
        avg_pagerank REAL NOT NULL DEFAULT 0.0,
        crawl_delay_secs INTEGER,
        fqdn_hash INTEGER NOT NULL,
        hash_bucket INTEGER NOT NULL,
        avg_last_visited INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_hostnames_tld ON hostnames(tld);
    CREATE INDEX IF NOT EXISTS idx_hostnames_bucket ON hostnames(hash_bucket);

    CREATE TABLE IF NOT EXISTS urls (
        url TEXT PRIMARY KEY,
        hostname TEXT NOT NULL,
        discovered_at INTEGER NOT NULL,
        last_visited INTEGER,
        pagerank REAL NOT NULL DEFAULT 0.0,
        blacklisted INTEGER NOT NULL DEFAULT 0,
        bot_excluded INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_urls_hostname ON urls(hostname);
    CREATE INDEX IF NOT EXISTS idx_urls_last_visited ON urls(last_visited);

    CREATE TABLE IF NOT EXISTS url_references (
        source_url TEXT NOT NULL,
        target_url TEXT NOT NULL,
        observed_at INTEGER NOT NULL,
        PRIMARY KEY (source_url, target_url, observed_at)
    );

    CREATE INDEX IF NOT EXISTS idx_url_references_target
        ON url_references(target_url);

    CREATE TABLE IF NOT EXISTS leases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hostname TEXT NOT NULL,
        fetcher_id TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_leases_hostname ON leases(hostname, expires_at);

    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_leases_fetcher ON leases(fetcher_id);
"#;

const REFRESH_AGGREGATES: &str = r#"
    UPDATE hostnames SET
        url_count = (SELECT COUNT(*) FROM urls WHERE hostname = ?1),
        avg_pagerank = COALESCE((SELECT AVG(pagerank) FROM urls WHERE hostname = ?1), 0.0),
        avg_last_visited = (
            SELECT CAST(ROUND(AVG(last_visited)) AS INTEGER)
            FROM urls WHERE hostname = ?1 AND last_visited IS NOT NULL
        )
    WHERE hostname = ?1
"#;

const HOSTNAME_COLUMNS: &str = "hostname, tld, last_ipv4, last_ipv6, url_count, avg_pagerank, \
     crawl_delay_secs, fqdn_hash, hash_bucket, avg_last_visited";

const URL_COLUMNS: &str =
    "url, hostname, discovered_at, last_visited, pagerank, blacklisted, bot_excluded";

const FETCHER_COLUMNS: &str = "id, contact, name, registered_at, location, tld_preference";

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_from_millis(idx: usize, ms: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ms.map(|ms| from_millis(idx, ms)).transpose()
}

fn fetcher_from_row(row: &Row<'_>) -> rusqlite::Result<Fetcher> {
    Ok(Fetcher {
        id: row.get(0)?,
        contact: row.get(1)?,
        name: row.get(2)?,
        registered_at: from_millis(3, row.get(3)?)?,
        location: row.get(4)?,
        tld_preference: row.get(5)?,
    })
}

fn hostname_from_row(row: &Row<'_>) -> rusqlite::Result<HostnameRecord> {
    Ok(HostnameRecord {
        hostname: row.get(0)?,
        tld: row.get(1)?,
        last_ipv4: row.get(2)?,
        last_ipv6: row.get(3)?,
        url_count: row.get::<_, i64>(4)? as u64,
        avg_pagerank: row.get(5)?,
        crawl_delay_secs: row.get(6)?,
        fqdn_hash: row.get::<_, i64>(7)? as u64,
        hash_bucket: row.get(8)?,
        avg_last_visited: opt_from_millis(9, row.get(9)?)?,
    })
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        url: row.get(0)?,
        hostname: row.get(1)?,
        discovered_at: from_millis(2, row.get(2)?)?,
        last_visited: opt_from_millis(3, row.get(3)?)?,
        pagerank: row.get(4)?,
        blacklisted: row.get(5)?,
        bot_excluded: row.get(6)?,
    })
}

fn lease_from_row(row: &Row<'_>) -> rusqlite::Result<Lease> {
    Ok(Lease {
        hostname: row.get(0)?,
        fetcher_id: row.get(1)?,
        expires_at: from_millis(2, row.get(2)?)?,
    })
}

/// SQLite-backed store
///
/// The connection is guarded by a `Mutex`; lease writes additionally run in
/// an `IMMEDIATE` transaction so other processes sharing the file are
/// serialized against them.
pub struct SqliteFrontierStore {
    conn: Mutex<Connection>,
    default_bucket_count: u32,
}

impl SqliteFrontierStore {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite frontier store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            default_bucket_count: DEFAULT_HASH_BUCKETS,
        })
    }

    /// Bucket count to pin when the first hostname is stored.
    ///
    /// A database that already has a bucket space keeps it.
    pub fn with_bucket_count(mut self, bucket_count: u32) -> Self {
        self.default_bucket_count = bucket_count;
        self
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned("sqlite connection"))
    }

    fn stored_bucket_count(conn: &Connection) -> StorageResult<Option<u32>> {
        let value = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![BUCKET_COUNT_KEY],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Bucket count of the stored hostnames, pinning the default on first use
    fn pin_bucket_count(&self, conn: &Connection) -> StorageResult<u32> {
        conn.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![BUCKET_COUNT_KEY, self.default_bucket_count],
        )?;
        Ok(Self::stored_bucket_count(conn)?.unwrap_or(self.default_bucket_count))
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl FrontierStore for SqliteFrontierStore {
    fn bucket_count(&self) -> StorageResult<u32> {
        let conn = self.lock()?;
        Ok(Self::stored_bucket_count(&conn)?.unwrap_or(self.default_bucket_count))
    }

    fn upsert_fetcher(&self, fetcher: &Fetcher) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO fetchers (id, contact, name, registered_at, location, tld_preference)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    contact = excluded.contact,
                    name = excluded.name,
                    registered_at = excluded.registered_at,
                    location = excluded.location,
                    tld_preference = excluded.tld_preference
            "#,
            params![
                fetcher.id,
                fetcher.contact,
                fetcher.name,
                to_millis(fetcher.registered_at),
                fetcher.location,
                fetcher.tld_preference,
            ],
        )?;
        Ok(())
    }

    fn get_fetcher(&self, id: &str) -> StorageResult<Option<Fetcher>> {
        let conn = self.lock()?;
        let fetcher = conn
            .query_row(
                &format!("SELECT {FETCHER_COLUMNS} FROM fetchers WHERE id = ?1"),
                params![id],
                fetcher_from_row,
            )
            .optional()?;
        Ok(fetcher)
    }

    fn fetchers_by_registration(&self) -> StorageResult<Vec<Fetcher>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FETCHER_COLUMNS} FROM fetchers ORDER BY registered_at ASC, id ASC"
        ))?;
        let fetchers = stmt
            .query_map([], fetcher_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fetchers)
    }

    fn count_fetchers(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM fetchers")
    }

    fn upsert_hostname(&self, record: &HostnameRecord) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let hash_bucket = bucket_of(record.fqdn_hash, self.pin_bucket_count(&tx)?);
        tx.execute(
            r#"
                INSERT INTO hostnames
                    (hostname, tld, last_ipv4, last_ipv6, crawl_delay_secs, fqdn_hash, hash_bucket)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(hostname) DO UPDATE SET
                    tld = excluded.tld,
                    last_ipv4 = excluded.last_ipv4,
                    last_ipv6 = excluded.last_ipv6,
                    crawl_delay_secs = excluded.crawl_delay_secs,
                    fqdn_hash = excluded.fqdn_hash,
                    hash_bucket = excluded.hash_bucket
            "#,
            params![
                record.hostname,
                record.tld,
                record.last_ipv4,
                record.last_ipv6,
                record.crawl_delay_secs,
                record.fqdn_hash as i64,
                hash_bucket,
            ],
        )?;
        tx.execute(REFRESH_AGGREGATES, params![record.hostname])?;
        tx.commit()?;
        Ok(())
    }

    fn get_hostname(&self, hostname: &str) -> StorageResult<Option<HostnameRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {HOSTNAME_COLUMNS} FROM hostnames WHERE hostname = ?1"),
                params![hostname],
                hostname_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn hostnames(&self) -> StorageResult<Vec<HostnameRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HOSTNAME_COLUMNS} FROM hostnames ORDER BY hostname ASC"
        ))?;
        let records = stmt
            .query_map([], hostname_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count_hostnames(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM hostnames")
    }

    fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let host = HostnameRecord::new(record.hostname.clone(), self.pin_bucket_count(&tx)?);
        tx.execute(
            r#"
                INSERT OR IGNORE INTO hostnames (hostname, tld, fqdn_hash, hash_bucket)
                VALUES (?1, ?2, ?3, ?4)
            "#,
            params![host.hostname, host.tld, host.fqdn_hash as i64, host.hash_bucket],
        )?;
        tx.execute(
            r#"
                INSERT INTO urls
                    (url, hostname, discovered_at, last_visited, pagerank, blacklisted, bot_excluded)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(url) DO UPDATE SET
                    last_visited = excluded.last_visited,
                    pagerank = excluded.pagerank,
                    blacklisted = excluded.blacklisted,
                    bot_excluded = excluded.bot_excluded
            "#,
            params![
                record.url,
                host.hostname,
                to_millis(record.discovered_at),
                record.last_visited.map(to_millis),
                record.pagerank,
                record.blacklisted,
                record.bot_excluded,
            ],
        )?;
        tx.execute(REFRESH_AGGREGATES, params![host.hostname])?;
        tx.commit()?;
        Ok(())
    }

    fn urls(&self, hostname: Option<&str>) -> StorageResult<Vec<UrlRecord>> {
        let conn = self.lock()?;
        let records = match hostname {
            Some(hostname) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {URL_COLUMNS} FROM urls WHERE hostname = ?1 ORDER BY url ASC"
                ))?;
                let rows = stmt.query_map(params![hostname], url_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {URL_COLUMNS} FROM urls ORDER BY url ASC"))?;
                let rows = stmt.query_map([], url_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    fn count_urls(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM urls")
    }

    fn visit_summary(&self) -> StorageResult<VisitSummary> {
        let conn = self.lock()?;
        let (total, visited, avg): (i64, i64, Option<i64>) = conn.query_row(
            r#"
                SELECT
                    COUNT(*),
                    COUNT(last_visited),
                    CAST(ROUND(AVG(last_visited)) AS INTEGER)
                FROM urls
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(VisitSummary {
            total_urls: total as u64,
            visited_urls: visited as u64,
            average_last_visited: opt_from_millis(2, avg)?,
        })
    }

    fn bucket_counts(&self) -> StorageResult<Vec<(u32, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT hash_bucket, COUNT(*) FROM hostnames GROUP BY hash_bucket ORDER BY hash_bucket",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    fn rebucket_hostnames(&self, bucket_count: u32) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let hashes: Vec<(String, i64)> = {
            let mut stmt = tx.prepare("SELECT hostname, fqdn_hash FROM hostnames")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        {
            let mut update = tx.prepare("UPDATE hostnames SET hash_bucket = ?1 WHERE hostname = ?2")?;
            for (hostname, hash) in &hashes {
                update.execute(params![bucket_of(*hash as u64, bucket_count), hostname])?;
            }
        }
        tx.execute(
            r#"
                INSERT INTO store_meta (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![BUCKET_COUNT_KEY, bucket_count],
        )?;
        tx.commit()?;

        tracing::info!(bucket_count, hostnames = hashes.len(), "Hostnames rebucketed");
        Ok(hashes.len())
    }

    fn purge_hostname(&self, hostname: &str) -> StorageResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
                DELETE FROM url_references
                WHERE source_url IN (SELECT url FROM urls WHERE hostname = ?1)
                   OR target_url IN (SELECT url FROM urls WHERE hostname = ?1)
            "#,
            params![hostname],
        )?;
        tx.execute("DELETE FROM urls WHERE hostname = ?1", params![hostname])?;
        tx.execute("DELETE FROM leases WHERE hostname = ?1", params![hostname])?;
        let removed = tx.execute("DELETE FROM hostnames WHERE hostname = ?1", params![hostname])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn add_reference(&self, reference: &UrlReference) -> StorageResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            r#"
                INSERT OR IGNORE INTO url_references (source_url, target_url, observed_at)
                VALUES (?1, ?2, ?3)
            "#,
            params![
                reference.source_url,
                reference.target_url,
                to_millis(reference.observed_at),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn references_to(&self, target_url: &str, limit: usize) -> StorageResult<Vec<UrlReference>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT source_url, target_url, MAX(observed_at) AS latest
                FROM url_references
                WHERE target_url = ?1
                GROUP BY source_url, target_url
                ORDER BY latest DESC, source_url ASC
                LIMIT ?2
            "#,
        )?;
        let references = stmt
            .query_map(params![target_url, limit as i64], |row| {
                Ok(UrlReference {
                    source_url: row.get(0)?,
                    target_url: row.get(1)?,
                    observed_at: from_millis(2, row.get(2)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(references)
    }

    fn count_references(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM url_references")
    }

    fn purge_expired_leases(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM leases WHERE expires_at <= ?1",
            params![to_millis(now)],
        )?;
        Ok(removed)
    }

    fn active_leases(
        &self,
        fetcher_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Lease>> {
        let conn = self.lock()?;
        let leases = match fetcher_id {
            Some(fetcher_id) => {
                let mut stmt = conn.prepare(
                    r#"
                        SELECT hostname, fetcher_id, expires_at FROM leases
                        WHERE expires_at > ?1 AND fetcher_id = ?2
                        ORDER BY hostname ASC, expires_at ASC
                    "#,
                )?;
                let rows = stmt.query_map(params![to_millis(now), fetcher_id], lease_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    r#"
                        SELECT hostname, fetcher_id, expires_at FROM leases
                        WHERE expires_at > ?1
                        ORDER BY hostname ASC, expires_at ASC
                    "#,
                )?;
                let rows = stmt.query_map(params![to_millis(now)], lease_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
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

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut holder = tx.prepare(
                r#"
                    SELECT fetcher_id FROM leases
                    WHERE hostname = ?1 AND expires_at > ?2
                    ORDER BY expires_at DESC
                    LIMIT 1
                "#,
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO leases (hostname, fetcher_id, expires_at) VALUES (?1, ?2, ?3)",
            )?;

            let mut seen = HashSet::new();
            for hostname in hostnames {
                if !seen.insert(hostname.as_str()) {
                    continue;
                }

                let current: Option<String> = holder
                    .query_row(params![hostname, to_millis(now)], |row| row.get(0))
                    .optional()?;

                match current {
                    None => {
                        insert.execute(params![hostname, fetcher_id, to_millis(expires_at)])?;
                        outcome.granted.push(hostname.clone());
                    }
                    Some(holder_id) if holder_id == fetcher_id => {
                        outcome.retained.push(hostname.clone());
                    }
                    Some(_) => outcome.rejected.push(hostname.clone()),
                }
            }
        }
        tx.commit()?;

        Ok(outcome)
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                DELETE FROM leases;
                DELETE FROM url_references;
                DELETE FROM urls;
                DELETE FROM hostnames;
                DELETE FROM fetchers;
                DELETE FROM store_meta;
            "#,
        )?;
        tracing::warn!("SQLite frontier store cleared");
        Ok(())
    }
}
