//! Partition strategies
//!
//! A partition strategy narrows the candidate hostnames to the subset a
//! given fetcher is allowed to take. Every strategy is a pure function of
//! the candidates and a [`PartitionContext`]; none of them touch the store.
//!
//! ```text
//!   candidates ──► PartitionMode::apply(ctx) ──► eligible
//!                      │
//!                      ├─ None                pass-through
//!                      ├─ PreferredDomain     tld == fetcher.tld_preference
//!                      ├─ HashBucket          hash_bucket == fetcher ordinal
//!                      └─ ConsistentHashRing  ring owner == fetcher
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frontier::error::ParseModeError;
use crate::models::{stable_hash, Fetcher, HostnameRecord};

/// Default number of ring tokens per fetcher
pub const DEFAULT_VIRTUAL_NODES: u32 = 64;

/// Partition strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionMode {
    /// Every candidate is eligible
    #[default]
    #[serde(rename = "none")]
    None,
    /// Only hostnames under the fetcher's preferred top-level domain
    #[serde(rename = "tld")]
    PreferredDomain,
    /// Only hostnames whose precomputed bucket equals the fetcher's ordinal
    #[serde(rename = "fqdn_hash")]
    HashBucket,
    /// Only hostnames the fetcher owns on the consistent-hash ring
    #[serde(rename = "consistent_hash")]
    ConsistentHashRing,
}

impl PartitionMode {
    pub const VALID: &'static [&'static str] = &["none", "tld", "fqdn_hash", "consistent_hash"];

    /// Wire name
    pub fn id(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PreferredDomain => "tld",
            Self::HashBucket => "fqdn_hash",
            Self::ConsistentHashRing => "consistent_hash",
        }
    }

    pub fn all() -> [PartitionMode; 4] {
        [
            Self::None,
            Self::PreferredDomain,
            Self::HashBucket,
            Self::ConsistentHashRing,
        ]
    }

    /// Whether the strategy needs the registered fetcher ordering
    pub fn needs_fleet(self) -> bool {
        matches!(self, Self::HashBucket | Self::ConsistentHashRing)
    }

    /// Keep the candidates the requesting fetcher may take.
    ///
    /// Candidate order is preserved.
    pub fn apply(
        self,
        candidates: Vec<HostnameRecord>,
        ctx: &PartitionContext<'_>,
    ) -> Vec<HostnameRecord> {
        match self {
            Self::None => candidates,
            Self::PreferredDomain => match ctx.fetcher.tld_preference.as_deref() {
                Some(tld) => candidates.into_iter().filter(|h| h.tld == tld).collect(),
                None => candidates,
            },
            Self::HashBucket => match ctx.fetcher_ordinal() {
                Some(ordinal) => candidates
                    .into_iter()
                    .filter(|h| h.hash_bucket == ordinal)
                    .collect(),
                None => Vec::new(),
            },
            Self::ConsistentHashRing => {
                if ctx.fetcher_ordinal().is_none() {
                    return Vec::new();
                }
                let ring = HashRing::build(ctx.fleet, ctx.ring_virtual_nodes);
                tracing::trace!(
                    fleet = ctx.fleet.len(),
                    tokens = ring.token_count(),
                    "Hash ring built"
                );
                candidates
                    .into_iter()
                    .filter(|h| ring.owner(h.fqdn_hash) == Some(ctx.fetcher.id.as_str()))
                    .collect()
            }
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PartitionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "all" => Ok(Self::None),
            "tld" | "preferred_domain" => Ok(Self::PreferredDomain),
            "fqdn_hash" | "hash_bucket" | "bucket" => Ok(Self::HashBucket),
            "consistent_hash" | "ring" => Ok(Self::ConsistentHashRing),
            _ => Err(ParseModeError::new("partition mode", s, Self::VALID)),
        }
    }
}

/// Inputs a partition strategy may consult
#[derive(Debug, Clone, Copy)]
pub struct PartitionContext<'a> {
    /// The requesting fetcher
    pub fetcher: &'a Fetcher,
    /// All registered fetchers, ordered by (registered_at, id)
    pub fleet: &'a [Fetcher],
    pub ring_virtual_nodes: u32,
}

impl<'a> PartitionContext<'a> {
    pub fn new(fetcher: &'a Fetcher, fleet: &'a [Fetcher], ring_virtual_nodes: u32) -> Self {
        Self {
            fetcher,
            fleet,
            ring_virtual_nodes,
        }
    }

    /// Zero-based registration ordinal of the requesting fetcher
    pub fn fetcher_ordinal(&self) -> Option<u32> {
        self.fleet
            .iter()
            .position(|f| f.id == self.fetcher.id)
            .map(|i| i as u32)
    }
}

// ============================================================================
// Consistent Hash Ring
// ============================================================================

/// 64-bit hash ring with virtual nodes.
///
/// Adding or removing one fetcher only moves the hostnames adjacent to its
/// tokens, unlike modulo bucketing where every assignment shifts.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    /// (token, fetcher id), sorted by token then id
    tokens: Vec<(u64, String)>,
}

impl HashRing {
    pub fn build(fleet: &[Fetcher], virtual_nodes: u32) -> Self {
        let mut tokens: Vec<(u64, String)> = fleet
            .iter()
            .flat_map(|fetcher| {
                (0..virtual_nodes).map(move |i| {
                    (stable_hash(&format!("{}#{}", fetcher.id, i)), fetcher.id.clone())
                })
            })
            .collect();
        tokens.sort();
        Self { tokens }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Fetcher owning `hash`: the first token at or clockwise after it
    pub fn owner(&self, hash: u64) -> Option<&str> {
        if self.tokens.is_empty() {
            return None;
        }
        let idx = self.tokens.partition_point(|(token, _)| *token < hash);
        let (_, id) = &self.tokens[idx % self.tokens.len()];
        Some(id.as_str())
    }
}
