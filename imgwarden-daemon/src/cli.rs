//! CLI argument definitions for imgwarden.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every flag is optional and, when given, takes precedence over the
//! config file and `IMGWARDEN_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

use imgwarden_core::config::WardenConfig;

/// Container image vulnerability reporter.
///
/// Correlates registry images with running workloads, collects security
/// findings for them, and reports per-team severity counts as a table,
/// CSV or Prometheus gauges.
#[derive(Parser, Debug, Default)]
#[command(name = "imgwarden")]
#[command(version, about, long_about = None)]
pub struct WardenCli {
    /// Path to imgwarden.toml configuration file.
    ///
    /// When omitted, built-in defaults and environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// What to scan: ecr (whole registry) or eks (images running in clusters).
    #[arg(long)]
    pub scan_target: Option<String>,

    /// How deep to page findings: short (first page only) or full.
    #[arg(long)]
    pub scan_depth: Option<String>,

    /// Report destination: stdout or a file path.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report format (table, csv).
    #[arg(long)]
    pub format: Option<String>,

    /// Repository tag key holding the owning team.
    #[arg(long)]
    pub owner_tag: Option<String>,

    /// Comma-delimited cluster contexts to scan.
    #[arg(long, value_delimiter = ',')]
    pub contexts: Option<Vec<String>>,

    /// Registry (account) id for the registry-wide scan.
    #[arg(long)]
    pub registry_id: Option<String>,

    /// Keep running: rescan every interval and serve Prometheus metrics.
    #[arg(long)]
    pub serve: bool,

    /// Seconds between scan cycles in serve mode.
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Metrics listen address in serve mode.
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Metrics listen port in serve mode.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Registry inventory document.
    #[arg(long)]
    pub inventory: Option<String>,

    /// Cluster workloads document.
    #[arg(long)]
    pub workloads: Option<String>,

    /// Findings document.
    #[arg(long)]
    pub findings: Option<String>,

    /// Validate configuration and exit without scanning.
    #[arg(long)]
    pub validate: bool,
}

impl WardenCli {
    /// Apply the flags that were given on top of `config`.
    ///
    /// Call [`WardenConfig::validate`] afterwards.
    pub fn apply_overrides(&self, config: &mut WardenConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut config.scan.target, &self.scan_target);
        set(&mut config.scan.depth, &self.scan_depth);
        set(&mut config.scan.interval_secs, &self.interval_secs);
        if self.serve {
            config.scan.serve = true;
        }

        set(&mut config.report.output, &self.output);
        set(&mut config.report.format, &self.format);

        set(&mut config.registry.owner_tag_key, &self.owner_tag);
        set(&mut config.registry.registry_id, &self.registry_id);
        set(&mut config.registry.inventory_path, &self.inventory);

        if let Some(contexts) = &self.contexts {
            config.cluster.contexts = contexts
                .iter()
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty())
                .collect();
        }
        set(&mut config.cluster.workloads_path, &self.workloads);
        set(&mut config.findings.findings_path, &self.findings);

        set(&mut config.metrics.listen_addr, &self.listen_addr);
        set(&mut config.metrics.port, &self.port);

        set(&mut config.general.log_level, &self.log_level);
        set(&mut config.general.log_format, &self.log_format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = WardenCli::try_parse_from([
            "imgwarden",
            "--scan-target",
            "eks",
            "--contexts",
            "preprod,prod",
            "--serve",
            "--interval-secs",
            "600",
        ])
        .unwrap();

        assert_eq!(cli.scan_target.as_deref(), Some("eks"));
        assert_eq!(
            cli.contexts,
            Some(vec!["preprod".to_owned(), "prod".to_owned()])
        );
        assert!(cli.serve);
        assert_eq!(cli.interval_secs, Some(600));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = WardenConfig::default();
        let cli = WardenCli {
            scan_target: Some("eks".to_owned()),
            format: Some("csv".to_owned()),
            contexts: Some(vec!["prod".to_owned(), " ".to_owned()]),
            owner_tag: Some("Owner".to_owned()),
            ..Default::default()
        };

        cli.apply_overrides(&mut config);

        assert_eq!(config.scan.target, "eks");
        assert_eq!(config.report.format, "csv");
        assert_eq!(config.cluster.contexts, vec!["prod".to_owned()]);
        assert_eq!(config.registry.owner_tag_key, "Owner");
    }

    #[test]
    fn absent_flags_leave_config_untouched() {
        let mut config = WardenConfig::default();
        config.scan.serve = true;
        config.registry.registry_id = "424851304182".to_owned();

        WardenCli::default().apply_overrides(&mut config);

        assert!(config.scan.serve);
        assert_eq!(config.registry.registry_id, "424851304182");
        assert_eq!(config.cluster.contexts, vec!["preprod".to_owned()]);
    }
}
