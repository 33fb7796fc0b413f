//! Metrics collection and exposition.
//!
//! # Metrics
//! - `doorman_rejected_total` (counter): pipeline rejections by stage
//! - `doorman_rate_limit_buckets` (gauge): live bucket count
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade; stages record at the
//!   rejection site
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;

/// Start the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    use metrics_exporter_prometheus::PrometheusBuilder;

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics exporter"),
    }
}
