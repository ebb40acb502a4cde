//! Concurrent fetchers racing for the same hostnames
//!
//! Every fetcher asks for everything at the same instant. The lease write
//! is a check-and-set, so each hostname must end up in exactly one response.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use websch::frontier::{FrontierAssembler, PartitionMode};
use websch::models::FrontierRequest;
use websch::storage::create_sqlite_store;

use super::fixtures::{add_hosts, assembler, create_test_stores, register, rng, t, test_config};

const FETCHERS: usize = 8;

async fn race(assemblers: Vec<Arc<FrontierAssembler>>, partition: PartitionMode) -> Vec<Vec<String>> {
    let tasks = (0..FETCHERS).map(|i| {
        let assembler = Arc::clone(&assemblers[i % assemblers.len()]);
        tokio::task::spawn_blocking(move || {
            let request = FrontierRequest::new(format!("f{i}")).partition(partition);
            assembler
                .build_frontier_at(&request, t(0), &mut rng(i as u64))
                .unwrap()
                .hostnames()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect()
}

fn assert_disjoint_cover(responses: &[Vec<String>], expected: &[String]) {
    let mut seen = HashSet::new();
    for hostnames in responses {
        for host in hostnames {
            assert!(seen.insert(host.clone()), "{host} issued to two fetchers");
        }
    }
    let expected: HashSet<String> = expected.iter().cloned().collect();
    assert_eq!(seen, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetchers_never_share_hostnames() {
    for store in create_test_stores(4) {
        for i in 0..FETCHERS {
            register(store.as_ref(), &format!("f{i}"), i as i64);
        }
        let hosts = add_hosts(store.as_ref(), 40, 3);

        let shared = Arc::new(assembler(&store));
        let responses = race(vec![shared], PartitionMode::None).await;

        assert_disjoint_cover(&responses, &hosts);
        assert_eq!(store.active_leases(None, t(1)).unwrap().len(), 40);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ring_partitioning() {
    for store in create_test_stores(4) {
        for i in 0..FETCHERS {
            register(store.as_ref(), &format!("f{i}"), i as i64);
        }
        let hosts = add_hosts(store.as_ref(), 64, 1);

        let shared = Arc::new(assembler(&store));
        let responses = race(vec![shared], PartitionMode::ConsistentHashRing).await;

        assert_disjoint_cover(&responses, &hosts);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_connections_on_one_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frontier.db");

    let setup = create_sqlite_store(&path, 4).unwrap();
    for i in 0..FETCHERS {
        register(setup.as_ref(), &format!("f{i}"), i as i64);
    }
    let hosts = add_hosts(setup.as_ref(), 30, 2);

    // one connection per assembler, as separate processes would have
    let assemblers: Vec<Arc<FrontierAssembler>> = (0..4)
        .map(|_| {
            let store = create_sqlite_store(&path, 4).unwrap();
            Arc::new(FrontierAssembler::new(store, test_config()))
        })
        .collect();

    let responses = race(assemblers, PartitionMode::None).await;
    assert_disjoint_cover(&responses, &hosts);
    assert_eq!(setup.active_leases(None, t(1)).unwrap().len(), 30);
}
