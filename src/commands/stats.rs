use anyhow::Result;
use chrono::Utc;

use websch::config::Config;
use websch::frontier::fleet_statistics;
use websch::metrics;

use super::{open_store, print_json};

pub fn stats(config: &Config, prometheus: bool) -> Result<()> {
    if prometheus {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!(error = %e, "Metrics initialization failed");
        }
    }

    let store = open_store(config)?;
    let stats = fleet_statistics(store.as_ref(), Utc::now())?;

    if prometheus {
        let encoded = metrics::encode_metrics().map_err(|e| anyhow::anyhow!("{e}"))?;
        print!("{encoded}");
        return Ok(());
    }

    print_json(&stats)
}
