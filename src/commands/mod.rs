pub mod frontier;
pub mod generate;
pub mod simulate;
pub mod stats;
pub mod store;

use anyhow::{Context, Result};
use serde::Serialize;

use websch::config::Config;
use websch::storage::{create_sqlite_store, SharedFrontierStore};

// Re-export command functions for convenience
pub use frontier::{frontier, references, sample};
pub use generate::generate;
pub use simulate::{simulate, SimulateParams};
pub use stats::stats;
pub use store::{add_url, init, purge_leases, register, RegisterParams};

/// Open the configured SQLite store
pub(crate) fn open_store(config: &Config) -> Result<SharedFrontierStore> {
    let path = &config.database.sqlite_path;
    create_sqlite_store(path, config.frontier.hash_buckets)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
