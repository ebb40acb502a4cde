use anyhow::Result;
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use websch::config::Config;
use websch::generator::{self, GenerateOptions};

use super::{open_store, print_json};

pub fn generate(config: &Config, options: GenerateOptions) -> Result<()> {
    let store = open_store(config)?;
    let mut rng = match config.frontier.random_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let report = generator::generate(store.as_ref(), &options, Utc::now(), &mut rng)?;
    print_json(&report)
}
