//! Scan orchestration -- assembly, run mode selection, and shutdown.
//!
//! The [`Orchestrator`] loads configuration, builds the document-backed
//! sources and the scanner, attaches a Prometheus recorder, and runs
//! either a single cycle or the continuous loop.
//!
//! # Run Modes
//!
//! - One-shot: one cycle, report written, process exits. A failed cycle is
//!   returned as an error so the binary exits non-zero.
//! - Serve: the metrics exporter is spawned, cycles repeat every
//!   `scan.interval_secs` until `SIGTERM`/`SIGINT`. Failed cycles are logged
//!   and the previous snapshot stays published.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::{ExporterFuture, PrometheusHandle};
use tokio_util::sync::CancellationToken;

use imgwarden_core::config::WardenConfig;
use imgwarden_scanner::{
    CycleReport, FileFindingsSource, FileInventorySource, FileWorkloadSource, Scanner,
    ScannerBuilder, ScannerConfig, SnapshotPublisher,
};

use crate::{metrics_server, report};

/// Scanner over the JSON document sources.
pub type DocumentScanner = Scanner<FileInventorySource, FileWorkloadSource, FileFindingsSource>;

/// The main orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: WardenConfig,
    scanner: DocumentScanner,
    /// Scrape handle for the recorder the scanner publishes into.
    metrics: PrometheusHandle,
    /// HTTP exporter, present in serve mode until `run` spawns it.
    exporter: Option<ExporterFuture>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The metrics exporter cannot bind its listen address
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: WardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let (recorder, exporter) = if config.scan.serve && config.metrics.enabled {
            let (recorder, exporter) = metrics_server::build_exporter(&config.metrics)?;
            (recorder, Some(exporter))
        } else {
            (metrics_server::build_recorder()?, None)
        };
        let metrics = recorder.handle();

        let scanner_config = ScannerConfig::from_core(&config);
        tracing::info!(
            target = %scanner_config.target,
            depth = %scanner_config.depth,
            contexts = ?scanner_config.contexts,
            serve = config.scan.serve,
            "initializing scanner"
        );

        let scanner = ScannerBuilder::new(
            FileInventorySource::new(&config.registry.inventory_path),
            FileWorkloadSource::new(&config.cluster.workloads_path),
            FileFindingsSource::new(&config.findings.findings_path),
        )
        .config(scanner_config)
        .publisher(SnapshotPublisher::new(Arc::new(recorder)))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build scanner: {}", e))?;

        Ok(Self {
            config,
            scanner,
            metrics,
            exporter,
        })
    }

    /// Run in the configured mode until done or shut down.
    pub async fn run(self) -> Result<()> {
        if self.config.scan.serve {
            self.serve().await
        } else {
            self.run_once().await.map(|_| ())
        }
    }

    /// Run a single cycle and write the report.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let cycle = self
            .scanner
            .run_cycle()
            .await
            .map_err(|e| {
                if e.is_source_failure() {
                    anyhow::anyhow!("scan cycle failed, nothing published: {}", e)
                } else {
                    anyhow::anyhow!("scan cycle failed: {}", e)
                }
            })?;
        self.write_report(&cycle)?;
        Ok(cycle)
    }

    /// Serve metrics and rescan until a shutdown signal arrives.
    async fn serve(mut self) -> Result<()> {
        let cancel = CancellationToken::new();

        let exporter_task = self.exporter.take().map(|exporter| {
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::error!(error = ?e, "metrics exporter stopped");
                }
            })
        });

        let signal_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                match wait_for_shutdown_signal().await {
                    Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
                }
                cancel.cancel();
            })
        };

        let config = &self.config;
        let owner_tag_key = self.scanner.config().owner_tag_key.clone();
        self.scanner
            .run_periodic(cancel.clone(), |cycle| {
                if config.report.output == "stdout" {
                    return;
                }
                if let Err(e) = report::write_report(
                    &cycle.findings,
                    &cycle.inventory,
                    &owner_tag_key,
                    &config.report,
                ) {
                    tracing::warn!(error = %e, "failed to write report");
                }
            })
            .await;

        signal_task.abort();
        if let Some(task) = exporter_task {
            task.abort();
        }

        tracing::info!("imgwarden shut down");
        Ok(())
    }

    fn write_report(&self, cycle: &CycleReport) -> Result<()> {
        report::write_report(
            &cycle.findings,
            &cycle.inventory,
            &self.scanner.config().owner_tag_key,
            &self.config.report,
        )
    }

    /// Render the current metrics in Prometheus text format.
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }

    pub fn scanner(&self) -> &DocumentScanner {
        &self.scanner
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}
