//! Priority strategies
//!
//! Long-term priority orders hostnames; short-term priority orders the URLs
//! inside one hostname. All deterministic orderings are stable sorts, so
//! ties keep the store order (hostname or URL ascending). `Random` shuffles
//! with the caller's RNG, which makes it reproducible under a fixed seed.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::frontier::error::ParseModeError;
use crate::models::{HostnameRecord, UrlRecord};

/// Hostname ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongTermPriority {
    #[default]
    Random,
    /// Largest sites first
    MostUrlsFirst,
    /// Smallest sites first
    FewestUrlsFirst,
    /// Highest mean pagerank first
    HighestRankFirst,
    /// Stalest sites first; never-visited sites lead
    OldestAverageVisitFirst,
    /// Freshest sites first; never-visited sites trail
    NewestAverageVisitFirst,
}

impl LongTermPriority {
    pub const VALID: &'static [&'static str] = &[
        "random",
        "most_urls_first",
        "fewest_urls_first",
        "highest_rank_first",
        "oldest_average_visit_first",
        "newest_average_visit_first",
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::MostUrlsFirst => "most_urls_first",
            Self::FewestUrlsFirst => "fewest_urls_first",
            Self::HighestRankFirst => "highest_rank_first",
            Self::OldestAverageVisitFirst => "oldest_average_visit_first",
            Self::NewestAverageVisitFirst => "newest_average_visit_first",
        }
    }

    pub fn all() -> [LongTermPriority; 6] {
        [
            Self::Random,
            Self::MostUrlsFirst,
            Self::FewestUrlsFirst,
            Self::HighestRankFirst,
            Self::OldestAverageVisitFirst,
            Self::NewestAverageVisitFirst,
        ]
    }

    /// Reorder `hostnames` in place
    pub fn order<R: Rng + ?Sized>(self, hostnames: &mut [HostnameRecord], rng: &mut R) {
        let cmp: fn(&HostnameRecord, &HostnameRecord) -> Ordering = match self {
            Self::Random => {
                hostnames.shuffle(rng);
                return;
            }
            Self::MostUrlsFirst => |a, b| b.url_count.cmp(&a.url_count),
            Self::FewestUrlsFirst => |a, b| a.url_count.cmp(&b.url_count),
            Self::HighestRankFirst => |a, b| b.avg_pagerank.total_cmp(&a.avg_pagerank),
            // None < Some, so ascending puts never-visited first
            Self::OldestAverageVisitFirst => |a, b| a.avg_last_visited.cmp(&b.avg_last_visited),
            Self::NewestAverageVisitFirst => |a, b| b.avg_last_visited.cmp(&a.avg_last_visited),
        };
        hostnames.sort_by(cmp);
    }
}

impl fmt::Display for LongTermPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for LongTermPriority {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "rand" => Ok(Self::Random),
            "most_urls_first" | "large_sites_first" | "lsf" => Ok(Self::MostUrlsFirst),
            "fewest_urls_first" | "small_sites_first" | "ssf" => Ok(Self::FewestUrlsFirst),
            "highest_rank_first" | "pagerank" => Ok(Self::HighestRankFirst),
            "oldest_average_visit_first" | "old_sites_first" | "osf" => {
                Ok(Self::OldestAverageVisitFirst)
            }
            "newest_average_visit_first" | "new_sites_first" | "nsf" => {
                Ok(Self::NewestAverageVisitFirst)
            }
            _ => Err(ParseModeError::new("long-term priority", s, Self::VALID)),
        }
    }
}

/// URL ordering within one hostname
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTermPriority {
    #[default]
    Random,
    /// Never-visited URLs first, then oldest visit
    LeastRecentlyVisitedFirst,
    /// Newest visit first, never-visited URLs last
    MostRecentlyVisitedFirst,
    HighestRankFirst,
}

impl ShortTermPriority {
    pub const VALID: &'static [&'static str] = &[
        "random",
        "least_recently_visited_first",
        "most_recently_visited_first",
        "highest_rank_first",
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::LeastRecentlyVisitedFirst => "least_recently_visited_first",
            Self::MostRecentlyVisitedFirst => "most_recently_visited_first",
            Self::HighestRankFirst => "highest_rank_first",
        }
    }

    pub fn all() -> [ShortTermPriority; 4] {
        [
            Self::Random,
            Self::LeastRecentlyVisitedFirst,
            Self::MostRecentlyVisitedFirst,
            Self::HighestRankFirst,
        ]
    }

    /// Reorder `urls` in place
    pub fn order<R: Rng + ?Sized>(self, urls: &mut [UrlRecord], rng: &mut R) {
        let cmp: fn(&UrlRecord, &UrlRecord) -> Ordering = match self {
            Self::Random => {
                urls.shuffle(rng);
                return;
            }
            Self::LeastRecentlyVisitedFirst => |a, b| a.last_visited.cmp(&b.last_visited),
            Self::MostRecentlyVisitedFirst => |a, b| b.last_visited.cmp(&a.last_visited),
            Self::HighestRankFirst => |a, b| b.pagerank.total_cmp(&a.pagerank),
        };
        urls.sort_by(cmp);
    }
}

impl fmt::Display for ShortTermPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ShortTermPriority {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "rand" => Ok(Self::Random),
            "least_recently_visited_first" | "oldest_first" | "old" => {
                Ok(Self::LeastRecentlyVisitedFirst)
            }
            "most_recently_visited_first" | "newest_first" | "new" => {
                Ok(Self::MostRecentlyVisitedFirst)
            }
            "highest_rank_first" | "pagerank" => Ok(Self::HighestRankFirst),
            _ => Err(ParseModeError::new("short-term priority", s, Self::VALID)),
        }
    }
}
