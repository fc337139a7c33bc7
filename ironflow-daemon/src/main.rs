mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;

use ironflow_core::config::IronflowConfig;
use ironflow_daemon::orchestrator::{Orchestrator, check_config};

use crate::cli::DaemonCli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = IronflowConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid command-line override: {}", e))?;

    if cli.validate {
        check_config(&config)?;
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "ironflow-daemon starting"
    );

    let mut orchestrator =
        Orchestrator::build_from_config(config)?.with_stdin_flows(cli.flows_from_stdin);
    orchestrator.run().await?;

    tracing::info!("ironflow-daemon shut down");
    Ok(())
}
