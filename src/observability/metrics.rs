//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mcp_sessions_created_total` (counter)
//! - `mcp_sessions_terminated_total` (counter): by termination reason
//! - `mcp_sessions_active` (gauge)
//! - `mcp_requests_total` (counter): by HTTP method and status
//! - `mcp_request_duration_seconds` (histogram)
//! - `mcp_security_rejections_total` (counter): by rejection reason
//! - `mcp_sweeps_total` (counter)
//! - `mcp_sessions_evicted_total` (counter): idle evictions
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing when the exporter is off.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session_created() {
    ::metrics::counter!("mcp_sessions_created_total").increment(1);
}

pub fn record_session_terminated(reason: &'static str) {
    ::metrics::counter!("mcp_sessions_terminated_total", "reason" => reason).increment(1);
}

pub fn record_active_sessions(count: usize) {
    ::metrics::gauge!("mcp_sessions_active").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "mcp_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("mcp_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_security_rejection(reason: &'static str) {
    ::metrics::counter!("mcp_security_rejections_total", "reason" => reason).increment(1);
}

pub fn record_sweep(evicted: usize) {
    ::metrics::counter!("mcp_sweeps_total").increment(1);
    if evicted > 0 {
        ::metrics::counter!("mcp_sessions_evicted_total").increment(evicted as u64);
    }
}
