//! Common test utilities

use chrono::{DateTime, TimeZone, Utc};
use websch::models::{FrontierRequest, HostnameRecord, UrlRecord};

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Create a hostname record with default values
pub fn create_test_hostname() -> HostnameRecord {
    let mut record = HostnameRecord::new("www.example.de", 16).with_crawl_delay(2);
    record.url_count = 3;
    record.avg_pagerank = 0.25;
    record
}

/// Create a URL record under `www.example.de`
#[allow(dead_code)]
pub fn create_test_url(path: &str) -> UrlRecord {
    UrlRecord::discovered(&format!("https://www.example.de/{path}"), epoch()).unwrap()
}

/// Request JSON as a fetcher would send it
#[allow(dead_code)]
pub fn create_request_json(fetcher_id: &str) -> String {
    format!(
        r#"{{"fetcher_id":"{fetcher_id}","amount":5,"length":20,"partition":"consistent_hash","long_term":"oldest_average_visit_first","short_term":"least_recently_visited_first"}}"#
    )
}

#[allow(dead_code)]
pub fn create_test_request() -> FrontierRequest {
    FrontierRequest::new("fetcher-1").amount(5).length(20)
}
