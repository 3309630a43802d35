//! Prometheus metrics for proxy observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090,
//! `METRICS_PORT=0` disables the exporter; recording calls become no-ops).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `proxy_requests_total` - Proxied `/api` requests (label: outcome)
//! - `proxy_cache_hits_total` - Requests served from the response cache
//! - `proxy_cache_misses_total` - Requests that went to the upstream
//! - `proxy_rate_limited_total` - Requests rejected with 429
//! - `proxy_upstream_failures_total` - Transport-level upstream failures
//!
//! ## Histograms
//! - `proxy_upstream_duration_seconds` - Outbound call latency
//!
//! ## Gauges
//! - `proxy_cache_entries` - Entries currently held by the response cache

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
    pub const CACHE_HITS_TOTAL: &str = "proxy_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "proxy_cache_misses_total";
    pub const RATE_LIMITED_TOTAL: &str = "proxy_rate_limited_total";
    pub const UPSTREAM_FAILURES_TOTAL: &str = "proxy_upstream_failures_total";
    pub const UPSTREAM_DURATION_SECONDS: &str = "proxy_upstream_duration_seconds";
    pub const CACHE_ENTRIES: &str = "proxy_cache_entries";
}

/// Initialize the Prometheus metrics exporter.
///
/// Sets up metric descriptions and starts the Prometheus HTTP listener on
/// the specified address.
///
/// # Errors
///
/// Returns an error message if the exporter cannot be installed.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total proxied /api requests by outcome"
    );
    describe_counter!(
        names::CACHE_HITS_TOTAL,
        "Requests served from the response cache"
    );
    describe_counter!(
        names::CACHE_MISSES_TOTAL,
        "Requests that required an upstream call"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Requests rejected by the rate limiter"
    );
    describe_counter!(
        names::UPSTREAM_FAILURES_TOTAL,
        "Transport-level failures reaching the upstream"
    );
    describe_histogram!(
        names::UPSTREAM_DURATION_SECONDS,
        "Outbound upstream call duration in seconds"
    );
    describe_gauge!(
        names::CACHE_ENTRIES,
        "Entries currently held by the response cache"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
///
/// This is useful for cases where metrics are optional.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a proxied request outcome ("relayed", "cache_hit", "upstream_error").
pub fn record_request(outcome: &'static str) {
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a response served from the cache.
pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

/// Record a cache miss that went to the upstream.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a 429 rejection.
pub fn record_rate_limited() {
    counter!(names::RATE_LIMITED_TOTAL).increment(1);
}

/// Record a transport-level upstream failure.
pub fn record_upstream_failure() {
    counter!(names::UPSTREAM_FAILURES_TOTAL).increment(1);
}

/// Record the latency of one outbound call.
pub fn record_upstream_duration(seconds: f64) {
    histogram!(names::UPSTREAM_DURATION_SECONDS).record(seconds);
}

/// Record the current cache entry count.
pub fn record_cache_entries(count: usize) {
    // Precision loss above 2^52 entries is acceptable for a gauge
    gauge!(names::CACHE_ENTRIES).set(count as f64);
}
