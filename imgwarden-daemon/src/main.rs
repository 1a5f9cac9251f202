use anyhow::Result;
use clap::Parser;

use imgwarden_core::config::WardenConfig;
use imgwarden_daemon::cli::WardenCli;
use imgwarden_daemon::logging;
use imgwarden_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WardenCli::parse();

    // file > env > defaults, then CLI flags on top
    let mut config = match &cli.config {
        Some(path) => WardenConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => WardenConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "imgwarden starting");

    Orchestrator::build_from_config(config).await?.run().await
}
