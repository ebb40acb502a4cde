//! Frontier distribution engine
//!
//! Hands each fetcher a disjoint batch of hostnames, with ordered URL lists,
//! and leases the hostnames so no other fetcher gets them until the lease
//! runs out.
//!
//! # Components
//!
//! - [`lease`]: time-bounded hostname checkout with lazy expiry
//! - [`partition`]: which hostnames a fetcher may take
//! - [`priority`]: hostname and URL ordering
//! - [`assembler`]: the per-request pipeline
//! - [`stats`]: fleet-wide statistics
//! - [`lookup`]: URL sampling and back-reference lookups

pub mod assembler;
pub mod error;
pub mod lease;
pub mod lookup;
pub mod partition;
pub mod priority;
pub mod stats;

pub use assembler::FrontierAssembler;
pub use error::{FrontierError, FrontierResult, ParseModeError};
pub use lease::LeaseLedger;
pub use lookup::{referencing_urls, sample_urls};
pub use partition::{HashRing, PartitionContext, PartitionMode};
pub use priority::{LongTermPriority, ShortTermPriority};
pub use stats::{fleet_statistics, partition_skew, FleetStatistics, VisitedRatio};
