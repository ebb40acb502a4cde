use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use futures::future::join_all;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use websch::config::Config;
use websch::frontier::{FrontierAssembler, LongTermPriority, PartitionMode, ShortTermPriority};
use websch::generator::{self, GenerateOptions};
use websch::models::FrontierRequest;
use websch::storage::create_memory_store;

use super::{open_store, print_json};

/// Parameters for a concurrent fleet simulation
pub struct SimulateParams {
    pub generate: GenerateOptions,
    pub rounds: usize,
    pub amount: i64,
    pub length: i64,
    pub partition: PartitionMode,
    pub long_term: LongTermPriority,
    pub short_term: ShortTermPriority,
    /// Run against the configured database instead of a scratch in-memory store
    pub use_database: bool,
}

#[derive(Debug, Serialize)]
struct RoundSummary {
    round: usize,
    hostnames_issued: usize,
    urls_issued: usize,
    idle_fetchers: usize,
    duplicate_hostnames: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    seed: u64,
    fetchers: usize,
    hostnames: usize,
    urls: usize,
    partition: PartitionMode,
    rounds: Vec<RoundSummary>,
    duplicate_hostnames: usize,
}

/// Run every generated fetcher concurrently for a number of rounds.
///
/// Each round happens one lease duration after the previous one, so all
/// leases from the last round have expired when the next one starts.
pub async fn simulate(config: Config, params: SimulateParams) -> Result<()> {
    let store = if params.use_database {
        tracing::warn!(path = %config.database.sqlite_path.display(), "Simulating against the configured database");
        open_store(&config)?
    } else {
        create_memory_store(config.frontier.hash_buckets)
    };

    let seed = config.frontier.random_seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let start = Utc::now();

    let generated = generator::generate(store.as_ref(), &params.generate, start, &mut rng)?;
    let lease_secs = i64::try_from(config.frontier.lease_duration_secs)
        .context("Lease duration too large")?;
    let assembler = Arc::new(FrontierAssembler::new(store, config.frontier.clone()));

    tracing::info!(
        seed,
        fetchers = generated.fetcher_ids.len(),
        rounds = params.rounds,
        partition = %params.partition,
        "Simulation starting"
    );

    let mut rounds = Vec::with_capacity(params.rounds);
    for round in 0..params.rounds {
        let at = start + Duration::seconds(lease_secs.saturating_mul(round as i64));

        let tasks = generated.fetcher_ids.iter().enumerate().map(|(i, id)| {
            let assembler = Arc::clone(&assembler);
            let request = FrontierRequest::new(id.clone())
                .amount(params.amount)
                .length(params.length)
                .partition(params.partition)
                .long_term(params.long_term)
                .short_term(params.short_term);
            let task_seed = seed ^ (((round as u64) << 32) | i as u64);

            tokio::task::spawn_blocking(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(task_seed);
                assembler.build_frontier_at(&request, at, &mut rng)
            })
        });

        let mut summary = RoundSummary {
            round,
            hostnames_issued: 0,
            urls_issued: 0,
            idle_fetchers: 0,
            duplicate_hostnames: 0,
        };
        let mut seen = HashSet::new();
        for result in join_all(tasks).await {
            let response = result.context("Simulation task panicked")??;
            if response.is_empty() {
                summary.idle_fetchers += 1;
            }
            summary.urls_issued += response.url_count;
            for batch in response.batches {
                summary.hostnames_issued += 1;
                if !seen.insert(batch.hostname) {
                    summary.duplicate_hostnames += 1;
                }
            }
        }

        tracing::info!(
            round,
            hostnames = summary.hostnames_issued,
            urls = summary.urls_issued,
            idle = summary.idle_fetchers,
            duplicates = summary.duplicate_hostnames,
            "Simulation round finished"
        );
        rounds.push(summary);
    }

    let duplicate_hostnames: usize = rounds.iter().map(|r| r.duplicate_hostnames).sum();
    if duplicate_hostnames > 0 {
        tracing::error!(duplicate_hostnames, "Hostnames were issued to more than one fetcher");
    }

    print_json(&SimulationReport {
        seed,
        fetchers: generated.fetcher_ids.len(),
        hostnames: generated.hostnames,
        urls: generated.urls,
        partition: params.partition,
        rounds,
        duplicate_hostnames,
    })
}
