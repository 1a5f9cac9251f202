//! Prometheus metrics recorder and HTTP exporter.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose the scrape endpoint. No global recorder is installed: the
//! recorder returned here is handed to the scanner's snapshot publisher.
//!
//! # Usage
//!
//! ```ignore
//! let (recorder, exporter) = build_exporter(&config.metrics)?;
//! tokio::spawn(exporter);
//! let publisher = SnapshotPublisher::new(Arc::new(recorder));
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use imgwarden_core::config::MetricsConfig;
use imgwarden_core::metrics as m;
use metrics_exporter_prometheus::{ExporterFuture, Matcher, PrometheusBuilder, PrometheusRecorder};

/// Builder with the histogram buckets every recorder shares.
fn base_builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(m::SCAN_CYCLE_DURATION_SECONDS.to_owned()),
            &m::SCAN_CYCLE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))
}

/// Set the build info gauge on `recorder`.
fn record_build_info(recorder: &PrometheusRecorder) {
    metrics::with_local_recorder(recorder, || {
        metrics::gauge!(m::BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    });
}

/// Build a recorder without an HTTP listener.
///
/// Used by one-shot runs, where the gauges are computed but never scraped.
pub fn build_recorder() -> Result<PrometheusRecorder> {
    let recorder = base_builder()?.build_recorder();
    record_build_info(&recorder);
    Ok(recorder)
}

/// Build the recorder and the HTTP exporter future serving it.
///
/// The exporter does nothing until it is polled; spawn it on the runtime.
///
/// # Errors
///
/// - Endpoint other than `/metrics`
/// - Unparseable listen address
/// - Socket binding fails
pub fn build_exporter(config: &MetricsConfig) -> Result<(PrometheusRecorder, ExporterFuture)> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    tracing::info!(listen_addr = %addr, "building Prometheus exporter");

    let (recorder, exporter) = base_builder()?
        .with_http_listener(addr)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build metrics exporter: {}", e))?;
    record_build_info(&recorder);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint ready");

    Ok((recorder, exporter))
}
