//! Frontier assembly scenarios
//!
//! Each test runs against both the SQLite and the in-memory store.

use std::collections::HashSet;

use chrono::Duration;
use websch::frontier::{
    fleet_statistics, LongTermPriority, PartitionMode, ShortTermPriority, VisitedRatio,
};
use websch::generator::{generate, GenerateOptions};
use websch::models::{FrontierRequest, UrlRecord};

use super::fixtures::{add_host, add_hosts, assembler, create_test_stores, register, rng, t, LEASE_SECS};

// ============================================================================
// Basic Scenarios
// ============================================================================

#[test]
fn test_single_fetcher_single_hostname() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_host(store.as_ref(), "a.com", 2);

        let request = FrontierRequest::new("f1")
            .amount(1)
            .length(1)
            .partition(PartitionMode::None)
            .long_term(LongTermPriority::Random)
            .short_term(ShortTermPriority::Random);
        let response = assembler(&store)
            .build_frontier_at(&request, t(10), &mut rng(1))
            .unwrap();

        assert_eq!(response.batch_count, 1);
        assert_eq!(response.url_count, 1);
        assert_eq!(response.hostnames(), vec!["a.com"]);
        assert_eq!(response.lease_expires_at, t(10 + LEASE_SECS));

        let leases = store.active_leases(Some("f1"), t(11)).unwrap();
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].hostname, "a.com");
        assert_eq!(leases[0].expires_at, t(10 + LEASE_SECS));
    }
}

#[test]
fn test_response_echoes_request() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_hosts(store.as_ref(), 3, 2);

        let request = FrontierRequest::new("f1")
            .amount(-1)
            .length(0)
            .long_term(LongTermPriority::MostUrlsFirst)
            .short_term(ShortTermPriority::HighestRankFirst);
        let response = assembler(&store)
            .build_frontier_at(&request, t(0), &mut rng(1))
            .unwrap();

        assert_eq!(response.fetcher_id, "f1");
        assert_eq!(response.amount, -1);
        assert_eq!(response.length, 0);
        assert_eq!(response.long_term, LongTermPriority::MostUrlsFirst);
        assert_eq!(response.short_term, ShortTermPriority::HighestRankFirst);
        assert_eq!(response.batch_count, 3);
        assert_eq!(response.url_count, 6);
        assert!(response.batches.iter().all(|b| b.crawl_delay_secs == 1));
    }
}

#[test]
fn test_hostname_leased_to_other_fetcher_is_excluded() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "a", 0);
        register(store.as_ref(), "b", 1);
        add_host(store.as_ref(), "taken.com", 3);
        add_host(store.as_ref(), "free.com", 3);

        store
            .record_leases("a", &["taken.com".to_string()], t(100), t(0))
            .unwrap();

        let response = assembler(&store)
            .build_frontier_at(&FrontierRequest::new("b"), t(10), &mut rng(2))
            .unwrap();
        assert_eq!(response.hostnames(), vec!["free.com"]);
    }
}

#[test]
fn test_active_leases_are_never_reissued() {
    for store in create_test_stores(4) {
        let ids = ["f1", "f2", "f3"];
        for (i, id) in ids.iter().enumerate() {
            register(store.as_ref(), id, i as i64);
        }
        add_hosts(store.as_ref(), 20, 2);
        let assembler = assembler(&store);

        // all requests fall inside the lease window of the first one
        let mut owner: std::collections::HashMap<String, &str> = Default::default();
        for step in 0..12 {
            let fetcher = ids[step % ids.len()];
            let request = FrontierRequest::new(fetcher).amount(2);
            let response = assembler
                .build_frontier_at(&request, t(step as i64), &mut rng(step as u64))
                .unwrap();
            for host in response.hostnames() {
                let previous = owner.insert(host.to_string(), fetcher);
                assert!(previous.is_none(), "{host} issued twice");
            }
        }
        assert_eq!(owner.len(), 20);
    }
}

#[test]
fn test_rerequest_does_not_return_own_leases() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_hosts(store.as_ref(), 2, 1);
        let assembler = assembler(&store);

        let first = assembler
            .build_frontier_at(&FrontierRequest::new("f1"), t(0), &mut rng(1))
            .unwrap();
        assert_eq!(first.batch_count, 2);

        let second = assembler
            .build_frontier_at(&FrontierRequest::new("f1"), t(30), &mut rng(1))
            .unwrap();
        assert!(second.is_empty());

        // the original expiry stands
        let leases = store.active_leases(Some("f1"), t(30)).unwrap();
        assert!(leases.iter().all(|l| l.expires_at == t(LEASE_SECS)));
    }
}

#[test]
fn test_expired_leases_release_hostnames() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "a", 0);
        register(store.as_ref(), "b", 1);
        add_hosts(store.as_ref(), 3, 1);
        let assembler = assembler(&store);

        let first = assembler
            .build_frontier_at(&FrontierRequest::new("a"), t(0), &mut rng(1))
            .unwrap();
        assert_eq!(first.batch_count, 3);

        let blocked = assembler
            .build_frontier_at(&FrontierRequest::new("b"), t(LEASE_SECS - 1), &mut rng(1))
            .unwrap();
        assert!(blocked.is_empty());

        let released = assembler
            .build_frontier_at(&FrontierRequest::new("b"), t(LEASE_SECS), &mut rng(1))
            .unwrap();
        assert_eq!(released.batch_count, 3);
        assert!(store.active_leases(Some("a"), t(LEASE_SECS)).unwrap().is_empty());
    }
}

// ============================================================================
// Partitioning
// ============================================================================

#[test]
fn test_hash_bucket_fetcher_without_bucket_gets_empty_frontier() {
    for store in create_test_stores(4) {
        for i in 0..5 {
            register(store.as_ref(), &format!("f{i}"), i);
        }
        add_hosts(store.as_ref(), 30, 1);

        // ordinal 4 has no bucket when there are 4 buckets
        let request = FrontierRequest::new("f4").partition(PartitionMode::HashBucket);
        let response = assembler(&store)
            .build_frontier_at(&request, t(0), &mut rng(1))
            .unwrap();
        assert_eq!(response.batch_count, 0);
        assert_eq!(response.url_count, 0);
        assert!(store.active_leases(None, t(0)).unwrap().is_empty());
    }
}

#[test]
fn test_hash_bucket_splits_hostnames_by_registration_order() {
    for store in create_test_stores(4) {
        // registered out of id order
        register(store.as_ref(), "zeta", 0);
        register(store.as_ref(), "alpha", 1);
        register(store.as_ref(), "mid", 2);
        register(store.as_ref(), "beta", 3);
        add_hosts(store.as_ref(), 40, 1);
        let assembler = assembler(&store);

        let mut issued = HashSet::new();
        for (ordinal, id) in ["zeta", "alpha", "mid", "beta"].iter().enumerate() {
            let request = FrontierRequest::new(*id).partition(PartitionMode::HashBucket);
            let response = assembler.build_frontier_at(&request, t(0), &mut rng(1)).unwrap();
            for host in response.hostnames() {
                let record = store.get_hostname(host).unwrap().unwrap();
                assert_eq!(record.hash_bucket, ordinal as u32);
                assert!(issued.insert(host.to_string()));
            }
        }
        assert_eq!(issued.len(), 40);
    }
}

#[test]
fn test_hash_bucket_covers_hostnames_added_after_generate() {
    for store in create_test_stores(16) {
        let options = GenerateOptions {
            fetchers: 4,
            hostnames: 4,
            min_urls: 1,
            max_urls: 1,
            ..Default::default()
        };
        let report = generate(store.as_ref(), &options, t(0), &mut rng(3)).unwrap();
        assert_eq!(store.bucket_count().unwrap(), 4);

        let added = add_hosts(store.as_ref(), 40, 1);
        let assembler = assembler(&store);

        let mut issued = HashSet::new();
        for id in &report.fetcher_ids {
            let request = FrontierRequest::new(id.clone()).partition(PartitionMode::HashBucket);
            let response = assembler.build_frontier_at(&request, t(1), &mut rng(1)).unwrap();
            for host in response.hostnames() {
                assert!(issued.insert(host.to_string()));
            }
        }
        assert_eq!(issued.len(), 44);
        assert!(added.iter().all(|host| issued.contains(host)));
    }
}

#[test]
fn test_consistent_hash_covers_every_hostname_once() {
    for store in create_test_stores(4) {
        for i in 0..3 {
            register(store.as_ref(), &format!("fetcher-{i}"), i);
        }
        let hosts = add_hosts(store.as_ref(), 60, 1);
        let assembler = assembler(&store);

        let mut issued = Vec::new();
        for i in 0..3 {
            let request = FrontierRequest::new(format!("fetcher-{i}"))
                .partition(PartitionMode::ConsistentHashRing);
            let response = assembler.build_frontier_at(&request, t(0), &mut rng(1)).unwrap();
            issued.extend(response.hostnames().into_iter().map(str::to_string));
        }
        issued.sort();
        assert_eq!(issued, hosts);
    }
}

#[test]
fn test_preferred_domain_partition() {
    for store in create_test_stores(4) {
        let fetcher = websch::models::Fetcher::new("ops@example.de", "de-fetcher")
            .with_id("de")
            .with_tld_preference("de");
        store.upsert_fetcher(&fetcher).unwrap();
        register(store.as_ref(), "any", 1);
        add_host(store.as_ref(), "shop.de", 1);
        add_host(store.as_ref(), "news.com", 1);
        add_host(store.as_ref(), "blog.de", 1);
        let assembler = assembler(&store);

        let request = FrontierRequest::new("de").partition(PartitionMode::PreferredDomain);
        let response = assembler.build_frontier_at(&request, t(0), &mut rng(1)).unwrap();
        let mut hosts = response.hostnames();
        hosts.sort();
        assert_eq!(hosts, vec!["blog.de", "shop.de"]);

        // no preference: everything that is left
        let request = FrontierRequest::new("any").partition(PartitionMode::PreferredDomain);
        let response = assembler.build_frontier_at(&request, t(0), &mut rng(1)).unwrap();
        assert_eq!(response.hostnames(), vec!["news.com"]);
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_long_and_short_term_ordering() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_host(store.as_ref(), "small.com", 1);
        add_host(store.as_ref(), "large.com", 5);
        add_host(store.as_ref(), "medium.com", 3);

        let visited = UrlRecord::discovered("http://large.com/page/0", t(0))
            .unwrap()
            .visited_at(t(-100));
        store.upsert_url(&visited).unwrap();

        let request = FrontierRequest::new("f1")
            .amount(2)
            .length(2)
            .long_term(LongTermPriority::MostUrlsFirst)
            .short_term(ShortTermPriority::MostRecentlyVisitedFirst);
        let response = assembler(&store)
            .build_frontier_at(&request, t(0), &mut rng(1))
            .unwrap();

        assert_eq!(response.hostnames(), vec!["large.com", "medium.com"]);
        assert_eq!(response.batches[0].urls[0].url, "http://large.com/page/0");
        assert_eq!(response.url_count, 4);
    }
}

#[test]
fn test_random_ordering_is_seeded() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        register(store.as_ref(), "f2", 1);
        add_hosts(store.as_ref(), 10, 5);
        let assembler = assembler(&store);

        let a = assembler
            .build_frontier_at(&FrontierRequest::new("f1"), t(0), &mut rng(42))
            .unwrap();
        // same store state, same seed, after the leases are gone
        let b = assembler
            .build_frontier_at(&FrontierRequest::new("f2"), t(LEASE_SECS), &mut rng(42))
            .unwrap();
        assert_eq!(a.url_list(), b.url_list());
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_visited_ratio_extremes() {
    for store in create_test_stores(4) {
        let stats = fleet_statistics(store.as_ref(), t(0)).unwrap();
        assert_eq!(stats.visited_ratio, VisitedRatio::Undefined);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["visited_ratio"], "undefined");

        add_host(store.as_ref(), "a.com", 4);
        let stats = fleet_statistics(store.as_ref(), t(0)).unwrap();
        assert_eq!(stats.visited_ratio, VisitedRatio::Ratio(0.0));

        for url in store.urls(Some("a.com")).unwrap() {
            store.upsert_url(&url.visited_at(t(0))).unwrap();
        }
        let stats = fleet_statistics(store.as_ref(), t(0)).unwrap();
        assert_eq!(stats.visited_ratio, VisitedRatio::Ratio(1.0));
        assert_eq!(stats.average_freshness, Some(t(0)));
    }
}

#[test]
fn test_statistics_after_distribution() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_hosts(store.as_ref(), 8, 2);
        assembler(&store)
            .build_frontier_at(&FrontierRequest::new("f1").amount(3), t(0), &mut rng(1))
            .unwrap();

        let stats = fleet_statistics(store.as_ref(), t(1)).unwrap();
        assert_eq!(stats.fetcher_count, 1);
        assert_eq!(stats.hostname_count, 8);
        assert_eq!(stats.url_count, 16);
        assert_eq!(stats.active_lease_count, 3);

        let later = t(0) + Duration::seconds(LEASE_SECS);
        let stats = fleet_statistics(store.as_ref(), later).unwrap();
        assert_eq!(stats.active_lease_count, 0);
    }
}
