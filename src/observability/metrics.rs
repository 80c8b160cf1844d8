//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_accepted_total` (counter)
//! - `proxy_accept_errors_total` (counter)
//! - `proxy_relays_total` (counter): by `outcome` (completed, dropped, error)
//! - `proxy_relay_duration_seconds` (histogram)
//! - `proxy_bytes_forwarded_total` (counter): by `direction` (upstream, downstream)
//! - `proxy_active_relays` (gauge)
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_accept() {
    counter!("proxy_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    counter!("proxy_accept_errors_total").increment(1);
}

/// Record a finished relay and how long it ran.
pub fn record_relay(outcome: &'static str, start: Instant) {
    counter!("proxy_relays_total", "outcome" => outcome).increment(1);
    histogram!("proxy_relay_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_bytes(direction: &'static str, bytes: u64) {
    counter!("proxy_bytes_forwarded_total", "direction" => direction).increment(bytes);
}

pub fn relay_started() {
    gauge!("proxy_active_relays").increment(1.0);
}

pub fn relay_finished() {
    gauge!("proxy_active_relays").decrement(1.0);
}
