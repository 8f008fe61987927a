// src/metrics.rs
use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install a global Prometheus recorder and return a handle for rendering.
/// Use this when the caller serves `/metrics` itself (or in tests).
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")
}

/// Install a global recorder plus the exporter's own HTTP listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: listen on {addr}"))
}
