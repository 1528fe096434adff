//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pompom_requests_total` (counter): requests by method, status, outcome
//! - `pompom_request_duration_seconds` (histogram): dispatch latency
//! - `pompom_routes` (gauge): routes in the frozen table

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    ::metrics::counter!(
        "pompom_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("pompom_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_count(count: usize) {
    ::metrics::gauge!("pompom_routes").set(count as f64);
}
