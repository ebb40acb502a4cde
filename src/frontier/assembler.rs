//! Frontier assembly
//!
//! One request runs this pipeline against the store:
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌───────────┐   ┌───────────┐
//! │  fetcher   │──►│ purge +    │──►│ partition │──►│ long-term │
//! │  lookup    │   │ exclude    │   │           │   │ order+cap │
//! └────────────┘   │ leased     │   └───────────┘   └─────┬─────┘
//!                  └────────────┘                         │
//!                                                         ▼
//!                  ┌────────────┐   ┌──────────────────────────────┐
//!                  │  record    │◄──│ per hostname: URLs, short-   │
//!                  │  leases    │   │ term order, cap, batch       │
//!                  └─────┬──────┘   └──────────────────────────────┘
//!                        ▼
//!                    response
//! ```
//!
//! Lease recording is a conditional write. When two fetchers race for the
//! same hostname, the loser sees it in `LeaseOutcome::rejected` and the
//! batch is dropped from its response, so no hostname is ever issued twice
//! while a lease is live.

use std::collections::HashSet;

use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::FrontierConfig;
use crate::frontier::error::{FrontierError, FrontierResult};
use crate::frontier::lease::LeaseLedger;
use crate::frontier::partition::PartitionContext;
use crate::metrics;
use crate::models::{FrontierRequest, FrontierResponse, HostnameBatch, HostnameRecord};
use crate::storage::SharedFrontierStore;

/// Treat non-positive limits as unbounded
fn limit(value: i64) -> Option<usize> {
    (value > 0).then(|| usize::try_from(value).unwrap_or(usize::MAX))
}

/// Builds frontiers for fetchers against a shared store
pub struct FrontierAssembler {
    store: SharedFrontierStore,
    config: FrontierConfig,
}

impl FrontierAssembler {
    pub fn new(store: SharedFrontierStore, config: FrontierConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &SharedFrontierStore {
        &self.store
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    /// Build a frontier at the current time.
    ///
    /// Random orderings draw from a generator seeded with
    /// `FrontierConfig::random_seed` when set, else from fresh entropy.
    pub fn build_frontier(&self, request: &FrontierRequest) -> FrontierResult<FrontierResponse> {
        let mut rng = match self.config.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.build_frontier_at(request, Utc::now(), &mut rng)
    }

    /// Build a frontier at `now` using `rng` for random orderings
    pub fn build_frontier_at<R: Rng + ?Sized>(
        &self,
        request: &FrontierRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> FrontierResult<FrontierResponse> {
        let partition = request.partition.id();
        let _timer = metrics::start_frontier_timer(partition);

        let result = self.assemble(request, now, rng);
        if result.is_err() {
            metrics::record_frontier_failed(partition);
        }
        result
    }

    fn assemble<R: Rng + ?Sized>(
        &self,
        request: &FrontierRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> FrontierResult<FrontierResponse> {
        let store = self.store.as_ref();

        let fetcher = store.get_fetcher(&request.fetcher_id)?.ok_or_else(|| {
            metrics::record_fetcher_not_found();
            tracing::warn!(fetcher_id = %request.fetcher_id, "Frontier requested by unknown fetcher");
            FrontierError::fetcher_not_found(&request.fetcher_id)
        })?;

        let ledger = LeaseLedger::new(store);
        ledger.purge_expired(now)?;
        let leased = ledger.active_hostnames(None, now)?;

        let candidates: Vec<HostnameRecord> = store
            .hostnames()?
            .into_iter()
            .filter(|h| !leased.contains(&h.hostname))
            .collect();
        let candidate_count = candidates.len();

        let fleet = if request.partition.needs_fleet() {
            store.fetchers_by_registration()?
        } else {
            Vec::new()
        };
        let ctx = PartitionContext::new(&fetcher, &fleet, self.config.ring_virtual_nodes);
        let mut eligible = request.partition.apply(candidates, &ctx);

        tracing::debug!(
            fetcher_id = %fetcher.id,
            leased = leased.len(),
            candidates = candidate_count,
            eligible = eligible.len(),
            partition = %request.partition,
            "Hostnames partitioned"
        );

        request.long_term.order(&mut eligible, rng);
        if let Some(amount) = limit(request.amount) {
            eligible.truncate(amount);
        }

        let mut batches = Vec::with_capacity(eligible.len());
        for host in &eligible {
            let mut urls = store.urls(Some(&host.hostname))?;
            if self.config.skip_excluded_urls {
                urls.retain(|u| !u.is_excluded());
            }
            request.short_term.order(&mut urls, rng);
            if let Some(length) = limit(request.length) {
                urls.truncate(length);
            }
            batches.push(HostnameBatch::new(host, urls, self.config.default_crawl_delay_secs));
        }

        let lease_expires_at = self.lease_expiry(now);
        let hostnames: Vec<String> = batches.iter().map(|b| b.hostname.clone()).collect();
        let outcome = ledger.record(&fetcher.id, &hostnames, lease_expires_at, now)?;
        metrics::record_lease_outcome(
            outcome.granted.len(),
            outcome.retained.len(),
            outcome.rejected.len(),
        );

        if outcome.has_contention() {
            tracing::warn!(
                fetcher_id = %fetcher.id,
                rejected = outcome.rejected.len(),
                "Lost lease race for some hostnames; dropping them from the frontier"
            );
        }
        let held: HashSet<&str> = outcome.held().map(String::as_str).collect();
        batches.retain(|b| held.contains(b.hostname.as_str()));

        let url_count: usize = batches.iter().map(|b| b.urls.len()).sum();
        metrics::record_frontier_issued(request.partition.id(), batches.len(), url_count);

        tracing::info!(
            fetcher_id = %fetcher.id,
            partition = %request.partition,
            long_term = %request.long_term,
            short_term = %request.short_term,
            batches = batches.len(),
            urls = url_count,
            lease_expires_at = %lease_expires_at,
            "Frontier issued"
        );

        Ok(FrontierResponse {
            fetcher_id: fetcher.id,
            partition: request.partition,
            long_term: request.long_term,
            short_term: request.short_term,
            amount: request.amount,
            length: request.length,
            batch_count: batches.len(),
            url_count,
            batches,
            lease_expires_at,
        })
    }

    /// `now + lease_duration`, truncated to the millisecond precision the store keeps
    fn lease_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = i64::try_from(self.config.lease_duration_secs).unwrap_or(i64::MAX);
        let expiry = Duration::try_seconds(secs)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        expiry
            .duration_trunc(Duration::milliseconds(1))
            .unwrap_or(expiry)
    }
}
