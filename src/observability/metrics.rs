//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted client connections
//! - `proxy_requests_total` (counter): framed requests by kind (connect, http)
//! - `proxy_errors_total` (counter): per-connection failures by kind
//! - `proxy_active_clients` (gauge): registry size after the last prune
//! - `proxy_relay_bytes_total` (counter): relayed bytes by direction
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection() {
    counter!("proxy_connections_total").increment(1);
}

pub fn record_request(kind: &'static str) {
    counter!("proxy_requests_total", "kind" => kind).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("proxy_errors_total", "kind" => kind).increment(1);
}

pub fn record_active_clients(count: usize) {
    gauge!("proxy_active_clients").set(count as f64);
}

pub fn record_relay_bytes(direction: &'static str, bytes: u64) {
    counter!("proxy_relay_bytes_total", "direction" => direction).increment(bytes);
}
