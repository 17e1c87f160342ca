//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_dispatch_total` (counter): requests by `outcome` (routed, not_found)
//! - `gate_events_active` (gauge): registered events
//! - `audit_lines_total` (counter): lines written by `kind` (key, passthrough)
//! - `audit_dropped_total` (counter): instructions not written by `reason`
//!   (mouse, malformed)
//! - `audit_write_errors_total` (counter): failed writes or flushes
//! - `audit_loggers_active` (gauge): open participant loggers
//!
//! Without an installed recorder every call is a no-op.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("gate_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn set_events_active(count: usize) {
    metrics::gauge!("gate_events_active").set(count as f64);
}

pub fn record_audit_line(kind: &'static str) {
    metrics::counter!("audit_lines_total", "kind" => kind).increment(1);
}

pub fn record_audit_dropped(reason: &'static str) {
    metrics::counter!("audit_dropped_total", "reason" => reason).increment(1);
}

pub fn record_audit_write_error() {
    metrics::counter!("audit_write_errors_total").increment(1);
}

pub fn set_loggers_active(count: usize) {
    metrics::gauge!("audit_loggers_active").set(count as f64);
}
