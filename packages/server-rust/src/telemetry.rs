//! Logging and metrics initialization.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Installs the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // try_init: a subscriber may already be set (tests, embedding)
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Starts the Prometheus scrape listener on `addr` when one is configured.
///
/// Without an address, metrics macros record into the no-op recorder.
///
/// # Errors
///
/// Returns an error if the exporter cannot bind or a recorder is already
/// installed.
pub fn init_metrics(addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let Some(addr) = addr else {
        return Ok(());
    };
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}
