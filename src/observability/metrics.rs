//! Metrics collection and exposition.
//!
//! # Metrics
//! - `metadata_requests_total` (counter): requests by resource class and
//!   status code

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own bind address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one handled request.
pub fn record_request(resource: &'static str, status: u16) {
    metrics::counter!(
        "metadata_requests_total",
        "resource" => resource,
        "status" => status.to_string()
    )
    .increment(1);
}
