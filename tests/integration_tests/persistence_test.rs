//! On-disk persistence of leases and aggregates

use websch::config::FrontierConfig;
use websch::frontier::FrontierAssembler;
use websch::models::FrontierRequest;
use websch::storage::create_sqlite_store;

use super::fixtures::{add_host, add_hosts, register, rng, t, test_config, LEASE_SECS};

#[test]
fn test_leases_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("frontier.db");

    let first = {
        let store = create_sqlite_store(&path, 4).unwrap();
        register(store.as_ref(), "a", 0);
        register(store.as_ref(), "b", 1);
        add_hosts(store.as_ref(), 6, 2);
        FrontierAssembler::new(store, test_config())
            .build_frontier_at(&FrontierRequest::new("a").amount(4), t(0), &mut rng(1))
            .unwrap()
    };
    assert_eq!(first.batch_count, 4);

    let store = create_sqlite_store(&path, 4).unwrap();
    let leases = store.active_leases(Some("a"), t(1)).unwrap();
    assert_eq!(leases.len(), 4);
    assert!(leases.iter().all(|l| l.expires_at == t(LEASE_SECS)));

    let second = FrontierAssembler::new(store, test_config())
        .build_frontier_at(&FrontierRequest::new("b"), t(1), &mut rng(1))
        .unwrap();
    assert_eq!(second.batch_count, 2);
    for host in second.hostnames() {
        assert!(!first.hostnames().contains(&host));
    }
}

#[test]
fn test_aggregates_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frontier.db");

    {
        let store = create_sqlite_store(&path, 8).unwrap();
        add_hosts(store.as_ref(), 3, 4);
    }

    // the bucket space pinned on first use wins over the configured default
    let store = create_sqlite_store(&path, FrontierConfig::default().hash_buckets).unwrap();
    assert_eq!(store.bucket_count().unwrap(), 8);
    add_host(store.as_ref(), "late.example.com", 1);

    let hostnames = store.hostnames().unwrap();
    assert_eq!(hostnames.len(), 4);
    assert!(hostnames.iter().all(|h| h.hash_bucket < 8));
    assert!(hostnames.iter().filter(|h| h.hostname != "late.example.com").all(|h| h.url_count == 4));
}

#[test]
fn test_rebucketed_space_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frontier.db");

    {
        let store = create_sqlite_store(&path, 16).unwrap();
        add_hosts(store.as_ref(), 5, 1);
        store.rebucket_hostnames(3).unwrap();
    }

    let store = create_sqlite_store(&path, 16).unwrap();
    assert_eq!(store.bucket_count().unwrap(), 3);
    add_host(store.as_ref(), "late.example.com", 1);
    assert!(store.hostnames().unwrap().iter().all(|h| h.hash_bucket < 3));
}
