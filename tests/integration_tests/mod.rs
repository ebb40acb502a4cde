//! Integration tests module
//!
//! End-to-end tests of the frontier engine against both stores:
//! - Frontier assembly scenarios and lease exclusivity
//! - Concurrent fetchers racing for the same hostnames
//! - Error handling and degenerate inputs
//! - On-disk persistence

pub mod concurrency_test;
pub mod error_scenarios;
pub mod fixtures;
pub mod frontier_test;
pub mod persistence_test;
