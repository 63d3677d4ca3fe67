//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//!
//! ```ignore
//! install_metrics_recorder(&config.metrics)?;
//! // metrics::counter!() / gauge!() / histogram!() now record to Prometheus
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use topowatch_core::config::MetricsConfig;
use topowatch_core::metrics as m;

/// Resolve the listener address from configuration.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process. Query and device-poll latencies get
/// explicit histogram buckets.
///
/// # Errors
///
/// - Invalid listen address or endpoint
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::ANALYSIS_PATH_QUERY_DURATION_SECONDS.to_owned()),
            &m::QUERY_DURATION_BUCKETS,
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(m::DISCOVERY_DEVICE_DURATION_SECONDS.to_owned()),
                &m::DEVICE_POLL_DURATION_BUCKETS,
            )
        })
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
