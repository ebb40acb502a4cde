//! Ad-hoc URL lookups that do not take leases

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::UrlRecord;
use crate::storage::{FrontierStore, StorageResult};

/// Up to `amount` URLs drawn uniformly at random, optionally from one hostname
pub fn sample_urls<S, R>(
    store: &S,
    hostname: Option<&str>,
    amount: usize,
    rng: &mut R,
) -> StorageResult<Vec<UrlRecord>>
where
    S: FrontierStore + ?Sized,
    R: Rng + ?Sized,
{
    let urls = store.urls(hostname)?;
    Ok(urls.choose_multiple(rng, amount).cloned().collect())
}

/// Up to `amount` distinct URLs linking to `target_url`, ordered by their
/// newest observation
pub fn referencing_urls<S: FrontierStore + ?Sized>(
    store: &S,
    target_url: &str,
    amount: usize,
) -> StorageResult<Vec<String>> {
    Ok(store
        .references_to(target_url, amount)?
        .into_iter()
        .map(|reference| reference.source_url)
        .collect())
}
