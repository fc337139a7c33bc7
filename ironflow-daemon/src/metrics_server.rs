//! Prometheus scrape endpoint.
//!
//! Per-exporter flow counters, routing lookup counters and the HTTP client
//! gauge are served by the `metrics-exporter-prometheus` listener once the
//! recorder is installed. Every series carries `service="ironflow"`.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use ironflow_core::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

const SCRAPE_PATH: &str = "/metrics";

/// Install the global recorder and start the scrape listener.
///
/// Fails when the endpoint is not `/metrics`, the address does not parse,
/// the port cannot be bound or a recorder is already installed.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(%addr, "metrics listener bound to all interfaces");
    }

    PrometheusBuilder::new()
        .add_global_label("service", "ironflow")
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to install metrics recorder on {addr}"))?;
    ironflow_core::metrics::describe_all();

    tracing::info!(%addr, path = SCRAPE_PATH, "metrics listener started");
    Ok(())
}

fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    anyhow::ensure!(
        config.endpoint == SCRAPE_PATH,
        "unsupported metrics endpoint '{}', the listener only serves {SCRAPE_PATH}",
        config.endpoint
    );
    let ip: IpAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address '{}'", config.listen_addr))?;
    Ok(SocketAddr::new(ip, config.port))
}
