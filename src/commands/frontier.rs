use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use websch::config::Config;
use websch::frontier::{referencing_urls, sample_urls, FrontierAssembler};
use websch::models::FrontierRequest;

use super::{open_store, print_json};

pub fn frontier(config: &Config, request: FrontierRequest) -> Result<()> {
    let store = open_store(config)?;
    let assembler = FrontierAssembler::new(store, config.frontier.clone());

    let response = assembler.build_frontier(&request)?;
    print_json(&response)
}

pub fn sample(config: &Config, hostname: Option<&str>, amount: usize) -> Result<()> {
    let store = open_store(config)?;
    let mut rng = match config.frontier.random_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let urls = sample_urls(store.as_ref(), hostname, amount, &mut rng)?;
    print_json(&json!({ "amount": urls.len(), "urls": urls }))
}

pub fn references(config: &Config, target: &str, amount: usize) -> Result<()> {
    let store = open_store(config)?;
    let sources = referencing_urls(store.as_ref(), target, amount)?;
    print_json(&json!({ "target": target, "amount": sources.len(), "urls": sources }))
}
