//! Error handling and degenerate inputs

use websch::error::{Error, ErrorCategory, WebschErrorTrait};
use websch::frontier::{fleet_statistics, FrontierError, PartitionMode};
use websch::models::{FrontierRequest, UrlRecord};

use super::fixtures::{add_host, add_hosts, assembler, create_test_stores, register, rng, t};

#[test]
fn test_unknown_fetcher_leaves_store_unchanged() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "known", 0);
        add_hosts(store.as_ref(), 5, 2);
        let before = fleet_statistics(store.as_ref(), t(0)).unwrap();

        let err = assembler(&store)
            .build_frontier_at(&FrontierRequest::new("unknown"), t(1), &mut rng(1))
            .unwrap_err();
        assert!(matches!(err, FrontierError::FetcherNotFound { .. }));
        assert!(!err.is_recoverable());

        let after = fleet_statistics(store.as_ref(), t(0)).unwrap();
        assert_eq!(after.active_lease_count, 0);
        assert_eq!(after.hostname_count, before.hostname_count);
        assert_eq!(after.url_count, before.url_count);

        let unified: Error = err.into();
        assert_eq!(unified.category(), ErrorCategory::Request);
    }
}

#[test]
fn test_empty_store_yields_empty_frontier() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        for mode in PartitionMode::all() {
            let request = FrontierRequest::new("f1").amount(10).partition(mode);
            let response = assembler(&store)
                .build_frontier_at(&request, t(0), &mut rng(1))
                .unwrap();
            assert!(response.is_empty(), "{mode}");
            assert_eq!(response.url_count, 0);
        }
    }
}

#[test]
fn test_excluded_urls_never_issued() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        add_host(store.as_ref(), "a.com", 3);

        let mut blocked = UrlRecord::discovered("http://a.com/private", t(0)).unwrap();
        blocked.bot_excluded = true;
        store.upsert_url(&blocked).unwrap();
        let mut spam = UrlRecord::discovered("http://a.com/spam", t(0)).unwrap();
        spam.blacklisted = true;
        store.upsert_url(&spam).unwrap();

        let response = assembler(&store)
            .build_frontier_at(&FrontierRequest::new("f1"), t(0), &mut rng(1))
            .unwrap();
        assert_eq!(response.url_count, 3);
        assert!(response
            .url_list()
            .iter()
            .all(|u| !u.ends_with("/private") && !u.ends_with("/spam")));
    }
}

#[test]
fn test_hostname_without_urls_still_batched() {
    for store in create_test_stores(4) {
        register(store.as_ref(), "f1", 0);
        let record = websch::models::HostnameRecord::new("empty.com", store.bucket_count().unwrap())
            .with_crawl_delay(7);
        store.upsert_hostname(&record).unwrap();

        let response = assembler(&store)
            .build_frontier_at(&FrontierRequest::new("f1"), t(0), &mut rng(1))
            .unwrap();
        assert_eq!(response.batch_count, 1);
        assert_eq!(response.batches[0].crawl_delay_secs, 7);
        assert!(response.batches[0].urls.is_empty());
    }
}

#[test]
fn test_invalid_url_is_rejected() {
    let err = UrlRecord::discovered("not a url", t(0)).unwrap_err();
    let unified: Error = err.into();
    assert_eq!(unified.category(), ErrorCategory::Storage);
    assert!(!unified.is_recoverable());
}
