//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nodehub_agent_requests_total` (counter): agent calls by endpoint, outcome
//! - `nodehub_events_total` (counter): apply-result events by outcome
//! - `nodehub_subscription_renders_total` (counter): feeds by format
//! - `nodehub_releases_total` (counter): releases created
//! - `nodehub_request_duration_seconds` (histogram): HTTP latency by method, status
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    histogram!(
        "nodehub_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_agent_request(endpoint: &'static str, outcome: &'static str) {
    counter!("nodehub_agent_requests_total", "endpoint" => endpoint, "outcome" => outcome).increment(1);
}

pub fn record_events(accepted: usize, rejected: usize) {
    counter!("nodehub_events_total", "outcome" => "accepted").increment(accepted as u64);
    counter!("nodehub_events_total", "outcome" => "rejected").increment(rejected as u64);
}

pub fn record_subscription_render(format: &'static str) {
    counter!("nodehub_subscription_renders_total", "format" => format).increment(1);
}

pub fn record_release() {
    counter!("nodehub_releases_total").increment(1);
}
