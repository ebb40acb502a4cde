//! Prometheus metrics for the frontier engine
//!
//! This module tracks:
//! - Distribution: frontier requests per partition mode, batches and URLs issued,
//!   leases granted/retained/rejected, unknown-fetcher requests, build duration
//! - Fleet: gauges mirroring the last computed fleet statistics
//!
//! # Usage
//!
//! Call `init_metrics()` once at startup. Until then (or if registration
//! fails) every recording function is a no-op.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Counters for frontier distribution
struct FrontierMetrics {
    requests: CounterVec,
    batches_issued: CounterVec,
    urls_issued: CounterVec,
    leases: CounterVec,
    fetcher_not_found: Counter,
    build_duration: HistogramVec,
}

/// Gauges for fleet statistics
struct FleetMetrics {
    fetchers: Gauge,
    hostnames: Gauge,
    urls: Gauge,
    active_leases: Gauge,
    visited_ratio: Gauge,
    partition_skew: Gauge,
}

static FRONTIER_METRICS: OnceLock<FrontierMetrics> = OnceLock::new();

static FLEET_METRICS: OnceLock<FleetMetrics> = OnceLock::new();

static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default Prometheus registry.
///
/// Idempotent: a second call returns `Ok(())` without registering again.
///
/// ```ignore
/// if let Err(e) = websch::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics disabled");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let frontier = FrontierMetrics {
        requests: register_counter_vec!(
            "websch_frontier_requests_total",
            "Frontier requests by partition mode and outcome",
            &["partition", "outcome"]
        )?,
        batches_issued: register_counter_vec!(
            "websch_frontier_batches_issued_total",
            "Hostname batches issued by partition mode",
            &["partition"]
        )?,
        urls_issued: register_counter_vec!(
            "websch_frontier_urls_issued_total",
            "URLs issued by partition mode",
            &["partition"]
        )?,
        leases: register_counter_vec!(
            "websch_frontier_leases_total",
            "Lease writes by result (granted, retained, rejected)",
            &["result"]
        )?,
        fetcher_not_found: register_counter!(
            "websch_frontier_fetcher_not_found_total",
            "Frontier requests from unregistered fetchers"
        )?,
        build_duration: register_histogram_vec!(
            "websch_frontier_build_duration_seconds",
            "Time spent assembling one frontier",
            &["partition"],
            vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    let fleet = FleetMetrics {
        fetchers: register_gauge!("websch_fleet_fetchers", "Registered fetchers")?,
        hostnames: register_gauge!("websch_fleet_hostnames", "Known hostnames")?,
        urls: register_gauge!("websch_fleet_urls", "Known URLs")?,
        active_leases: register_gauge!("websch_fleet_active_leases", "Active hostname leases")?,
        visited_ratio: register_gauge!(
            "websch_fleet_visited_ratio",
            "Share of URLs visited at least once (NaN when no URLs)"
        )?,
        partition_skew: register_gauge!(
            "websch_fleet_partition_skew",
            "Relative spread of hostnames across hash buckets"
        )?,
    };

    FRONTIER_METRICS
        .set(frontier)
        .map_err(|_| "Frontier metrics already initialized")?;
    FLEET_METRICS
        .set(fleet)
        .map_err(|_| "Fleet metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

pub fn metrics_initialized() -> bool {
    FRONTIER_METRICS.get().is_some() && FLEET_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a completed frontier request
pub fn record_frontier_issued(partition: &str, batches: usize, urls: usize) {
    let Some(m) = FRONTIER_METRICS.get() else {
        return;
    };

    m.requests.with_label_values(&[partition, "ok"]).inc();
    m.batches_issued
        .with_label_values(&[partition])
        .inc_by(batches as f64);
    m.urls_issued
        .with_label_values(&[partition])
        .inc_by(urls as f64);
}

/// Record a request that failed before anything was issued
pub fn record_frontier_failed(partition: &str) {
    if let Some(m) = FRONTIER_METRICS.get() {
        m.requests.with_label_values(&[partition, "error"]).inc();
    }
}

pub fn record_fetcher_not_found() {
    if let Some(m) = FRONTIER_METRICS.get() {
        m.fetcher_not_found.inc();
    }
}

/// Record the result of one lease write
pub fn record_lease_outcome(granted: usize, retained: usize, rejected: usize) {
    let Some(m) = FRONTIER_METRICS.get() else {
        return;
    };

    for (result, count) in [("granted", granted), ("retained", retained), ("rejected", rejected)] {
        if count > 0 {
            m.leases.with_label_values(&[result]).inc_by(count as f64);
        }
    }
}

/// Mirror the latest fleet statistics
pub fn update_fleet_metrics(
    fetchers: u64,
    hostnames: u64,
    urls: u64,
    active_leases: usize,
    visited_ratio: Option<f64>,
    partition_skew: f64,
) {
    let Some(m) = FLEET_METRICS.get() else {
        return;
    };

    m.fetchers.set(fetchers as f64);
    m.hostnames.set(hostnames as f64);
    m.urls.set(urls as f64);
    m.active_leases.set(active_leases as f64);
    m.visited_ratio.set(visited_ratio.unwrap_or(f64::NAN));
    m.partition_skew.set(partition_skew);
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start timing one frontier build
pub fn start_frontier_timer(partition: &str) -> MetricsTimer {
    match FRONTIER_METRICS.get() {
        Some(m) => MetricsTimer::new(m.build_duration.with_label_values(&[partition]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
