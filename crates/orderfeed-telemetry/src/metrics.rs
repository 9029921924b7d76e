//! Prometheus metrics for the recent-orders feed.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, register_int_gauge,
    CounterVec, Encoder, Histogram, IntCounter, IntGauge, TextEncoder,
};

/// Total ingest calls by source (snapshot/live) and outcome
/// (inserted/duplicate/too_old/rejected).
pub static INGEST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderfeed_ingest_total",
        "Total orders offered to the feed by outcome",
        &["source", "outcome"]
    )
    .unwrap()
});

/// Time spent in one ingest call, persist included.
pub static INGEST_LATENCY_US: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "orderfeed_ingest_latency_us",
        "Ingest latency in microseconds including the persist step",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 50000.0]
    )
    .unwrap()
});

/// Total orders evicted from the tail of the feed.
pub static EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "orderfeed_evicted_total",
        "Total orders evicted from the feed to respect capacity"
    )
    .unwrap()
});

/// Current number of orders in the feed.
pub static FEED_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("orderfeed_feed_length", "Current number of orders in the feed").unwrap()
});

/// Persist/remove failures since startup.
pub static PERSIST_FAILURES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "orderfeed_persist_failures",
        "Persistent store write failures since startup"
    )
    .unwrap()
});

/// Live payloads by parse result (parsed/ignored/failed).
pub static LIVE_PAYLOAD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderfeed_live_payload_total",
        "Total live subscription payloads by parse result",
        &["result"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record one ingest call.
    pub fn ingest(source: &str, outcome: &str, latency_us: f64) {
        INGEST_TOTAL.with_label_values(&[source, outcome]).inc();
        INGEST_LATENCY_US.observe(latency_us);
    }

    /// Record orders evicted by an insert.
    pub fn evicted(count: usize) {
        EVICTED_TOTAL.inc_by(count as u64);
    }

    /// Set the current feed length.
    pub fn feed_length(len: usize) {
        FEED_LENGTH.set(len as i64);
    }

    /// Set the persist failure count.
    pub fn persist_failures(total: u64) {
        PERSIST_FAILURES.set(total as i64);
    }

    /// Record a live payload parse result.
    pub fn live_payload(result: &str) {
        LIVE_PAYLOAD_TOTAL.with_label_values(&[result]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
