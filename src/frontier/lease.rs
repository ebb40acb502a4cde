//! Lease ledger
//!
//! A lease checks a hostname out to one fetcher until its expiry. Leases are
//! never released explicitly; they die by timeout and are purged lazily
//! before each distribution and statistics run.
//!
//! The ledger is a stateless view over the store. All mutual exclusion
//! comes from [`FrontierStore::record_leases`], which performs the
//! check-and-set atomically.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::LeaseOutcome;
use crate::storage::{FrontierStore, StorageResult};

/// Read/write access to lease state in a store
pub struct LeaseLedger<'a, S: FrontierStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FrontierStore + ?Sized> LeaseLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Remove every lease whose expiry is at or before `now`
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let removed = self.store.purge_expired_leases(now)?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired leases");
        }
        Ok(removed)
    }

    /// Hostnames leased past `now`, optionally scoped to one fetcher
    pub fn active_hostnames(
        &self,
        fetcher_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StorageResult<BTreeSet<String>> {
        Ok(self
            .store
            .active_leases(fetcher_id, now)?
            .into_iter()
            .map(|lease| lease.hostname)
            .collect())
    }

    /// Lease `hostnames` to `fetcher_id` until `expires_at`.
    ///
    /// Hostnames the fetcher already holds keep their original expiry, so
    /// re-requesting work never extends a lease. Hostnames held by another
    /// fetcher are reported as rejected and not written.
    pub fn record(
        &self,
        fetcher_id: &str,
        hostnames: &[String],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<LeaseOutcome> {
        let outcome = self
            .store
            .record_leases(fetcher_id, hostnames, expires_at, now)?;

        tracing::debug!(
            fetcher_id,
            granted = outcome.granted.len(),
            retained = outcome.retained.len(),
            rejected = outcome.rejected.len(),
            expires_at = %expires_at,
            "Leases recorded"
        );
        Ok(outcome)
    }
}
