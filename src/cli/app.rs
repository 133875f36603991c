use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::analyze::cmd_analyze;
use super::commands::Commands;
use super::crawl::cmd_crawl;
use super::env::{CliArgs, VERSION};
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting rt-visibility v{}", VERSION);

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    if !path.as_os_str().is_empty() {
        tracing::debug!(config = %path.display(), "configuration resolved");
    }

    let result = match cli.command {
        Commands::Crawl(args) => cmd_crawl(args, config).await,
        Commands::Analyze(args) => cmd_analyze(args, config).await,
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
