//! cep-ingest - Main entry point

use anyhow::{Context, Result};
use cep_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use cep_ingest::commands;
use cep_ingest::config::Config;
use cep_ingest::store::CepStore;
use cep_ingest::{Cli, Commands};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("cep-ingest")
        .build();

    // Environment variables take precedence over flags
    let log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {:#}", e);
            process::exit(2);
        },
    };

    // The CLI works without logging, so a failed init is only reported
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config)?;

    let progress = commands::progress_sink(cli.quiet);

    if let Commands::Fetch = cli.command {
        commands::refresh::fetch(&config, progress.as_ref()).await?;
        return Ok(());
    }

    let store = CepStore::open(&config.sqlite_path)
        .await
        .with_context(|| format!("Failed to open store at {}", config.sqlite_path.display()))?;

    let result = match &cli.command {
        Commands::Refresh { json } => {
            commands::refresh::run(&config, &store, progress.as_ref(), *json).await
        },
        Commands::Load { file } => commands::load::run(&config, &store, file.clone()).await,
        Commands::Lookup { cep } => commands::lookup::run(&store, cep).await,
        Commands::Delete { cep } => commands::lookup::delete(&store, cep).await,
        Commands::Fetch => Ok(()),
    };

    store.close().await;
    Ok(result?)
}
