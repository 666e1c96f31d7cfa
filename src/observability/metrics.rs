//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count redirect responses by status
//! - Count config reloads by trigger and outcome
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `redirector_requests_total` (counter): responses by status code
//! - `redirector_request_duration_seconds` (histogram): handler latency
//! - `redirector_config_reloads_total` (counter): reloads by trigger, outcome
//!
//! # Design Decisions
//! - Without an installed exporter every update is a no-op
//! - Labels are low-cardinality: never the request host

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "redirector_requests_total";
pub const REQUEST_DURATION: &str = "redirector_request_duration_seconds";
pub const CONFIG_RELOADS_TOTAL: &str = "redirector_config_reloads_total";

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one answered redirect request.
pub fn record_request(status: u16, started: Instant) {
    metrics::counter!(REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    metrics::histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
}

/// Record a config reload attempt.
pub fn record_reload(trigger: &'static str, outcome: &'static str) {
    metrics::counter!(CONFIG_RELOADS_TOTAL, "trigger" => trigger, "outcome" => outcome).increment(1);
}
