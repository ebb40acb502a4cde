use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use websch::config::Config;
use websch::frontier::{LongTermPriority, PartitionMode, ShortTermPriority};
use websch::generator::GenerateOptions;
use websch::models::FrontierRequest;

mod commands;

#[derive(Parser)]
#[command(
    name = "websch",
    version,
    about = "Frontier distribution engine for distributed web fetchers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to WEBSCH_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the configuration)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Register a fetcher in the directory
    Register {
        /// Operator contact address
        contact: String,

        /// Human-readable fetcher name
        name: String,

        /// Fixed fetcher id (a UUID is generated otherwise)
        #[arg(long)]
        id: Option<String>,

        /// Free-form location
        #[arg(long)]
        location: Option<String>,

        /// Preferred top-level domain for tld partitioning
        #[arg(long)]
        tld: Option<String>,
    },

    /// Add or update a URL
    AddUrl {
        url: String,

        #[arg(long, default_value_t = 0.0)]
        pagerank: f64,

        /// Mark the URL as visited now
        #[arg(long, default_value = "false")]
        visited: bool,
    },

    /// Populate the database with a synthetic fleet
    Generate {
        #[arg(long, default_value_t = 3)]
        fetchers: usize,

        #[arg(long, default_value_t = 20)]
        hostnames: usize,

        #[arg(long, default_value_t = 10)]
        min_urls: usize,

        #[arg(long, default_value_t = 100)]
        max_urls: usize,

        #[arg(long, default_value_t = 1.0)]
        visited_ratio: f64,

        /// Random reference edges between URLs
        #[arg(long, default_value_t = 0)]
        references: usize,

        /// Keep existing data instead of wiping the store
        #[arg(long, default_value = "false")]
        keep: bool,
    },

    /// Build and lease a frontier for a fetcher
    Frontier {
        fetcher_id: String,

        /// Hostname batches to return (0 = unbounded)
        #[arg(short, long, default_value_t = 0)]
        amount: i64,

        /// URLs per hostname (0 = unbounded)
        #[arg(short, long, default_value_t = 0)]
        length: i64,

        /// Partition mode (none, tld, fqdn_hash, consistent_hash)
        #[arg(short, long, default_value = "none")]
        partition: PartitionMode,

        /// Hostname ordering
        #[arg(long, default_value = "random")]
        long_term: LongTermPriority,

        /// URL ordering within a hostname
        #[arg(long, default_value = "random")]
        short_term: ShortTermPriority,
    },

    /// Random URL sample (does not lease)
    Sample {
        #[arg(short, long, default_value_t = 10)]
        amount: usize,

        /// Restrict the sample to one hostname
        #[arg(long)]
        hostname: Option<String>,
    },

    /// URLs that link to a target URL
    References {
        target: String,

        #[arg(short, long, default_value_t = 10)]
        amount: usize,
    },

    /// Print fleet statistics
    Stats {
        /// Print Prometheus metrics instead of JSON
        #[arg(long, default_value = "false")]
        prometheus: bool,
    },

    /// Remove expired leases
    PurgeLeases,

    /// Run a concurrent fleet against a synthetic frontier
    Simulate {
        #[arg(long, default_value_t = 4)]
        fetchers: usize,

        #[arg(long, default_value_t = 50)]
        hostnames: usize,

        #[arg(long, default_value_t = 3)]
        rounds: usize,

        #[arg(short, long, default_value_t = 5)]
        amount: i64,

        #[arg(short, long, default_value_t = 10)]
        length: i64,

        #[arg(short, long, default_value = "consistent_hash")]
        partition: PartitionMode,

        #[arg(long, default_value = "random")]
        long_term: LongTermPriority,

        #[arg(long, default_value = "random")]
        short_term: ShortTermPriority,

        /// Use (and wipe) the configured database instead of an in-memory store
        #[arg(long, default_value = "false")]
        use_database: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = load_config(cli.config.as_deref(), cli.database)?;
    tracing::debug!(
        database = %config.database.sqlite_path.display(),
        lease_secs = config.frontier.lease_duration_secs,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Init => commands::init(&config)?,

        Commands::Register {
            contact,
            name,
            id,
            location,
            tld,
        } => commands::register(
            &config,
            commands::RegisterParams {
                contact,
                name,
                id,
                location,
                tld,
            },
        )?,

        Commands::AddUrl {
            url,
            pagerank,
            visited,
        } => commands::add_url(&config, &url, pagerank, visited)?,

        Commands::Generate {
            fetchers,
            hostnames,
            min_urls,
            max_urls,
            visited_ratio,
            references,
            keep,
        } => {
            tracing::info!(fetchers, hostnames, min_urls, max_urls, "Starting generate command");
            commands::generate(
                &config,
                GenerateOptions {
                    reset: !keep,
                    fetchers,
                    hostnames,
                    min_urls,
                    max_urls,
                    visited_ratio,
                    references,
                },
            )?
        }

        Commands::Frontier {
            fetcher_id,
            amount,
            length,
            partition,
            long_term,
            short_term,
        } => {
            let request = FrontierRequest::new(fetcher_id)
                .amount(amount)
                .length(length)
                .partition(partition)
                .long_term(long_term)
                .short_term(short_term);
            commands::frontier(&config, request)?
        }

        Commands::Sample { amount, hostname } => {
            commands::sample(&config, hostname.as_deref(), amount)?
        }

        Commands::References { target, amount } => commands::references(&config, &target, amount)?,

        Commands::Stats { prometheus } => commands::stats(&config, prometheus)?,

        Commands::PurgeLeases => commands::purge_leases(&config)?,

        Commands::Simulate {
            fetchers,
            hostnames,
            rounds,
            amount,
            length,
            partition,
            long_term,
            short_term,
            use_database,
        } => {
            let params = commands::SimulateParams {
                generate: GenerateOptions {
                    fetchers,
                    hostnames,
                    ..GenerateOptions::default()
                },
                rounds,
                amount,
                length,
                partition,
                long_term,
                short_term,
                use_database,
            };
            commands::simulate(config, params).await?
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, database: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(database) = database {
        config.database.sqlite_path = database;
    }
    config.validate()?;
    Ok(config)
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("websch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("websch=info,warn")
    };

    // stdout carries the JSON results, so logs go to stderr
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
