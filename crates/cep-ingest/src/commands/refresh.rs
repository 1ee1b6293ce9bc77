//! `cep-ingest refresh` and `cep-ingest fetch`

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{self, AcquireReport};
use crate::progress::{format_bytes, ProgressSink};
use crate::store::CepStore;
use colored::Colorize;

/// Download, install and load the dataset
pub async fn run(config: &Config, store: &CepStore, progress: &dyn ProgressSink, json: bool) -> Result<()> {
    let url = config.require_source_url()?;
    if !json {
        println!("{} Refreshing from {}...", "→".cyan(), url);
    }

    let client = pipeline::http_client(config)?;
    let report = pipeline::refresh(config, store, &client, progress).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| crate::CepError::config(format!("Failed to render report: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    print_acquired(&report.acquired);
    println!(
        "{} {} record(s) applied, {} row(s) in store",
        "✓".green(),
        report.records_applied,
        report.rows_total
    );
    println!("\n{} Refresh complete", "✓".green().bold());

    Ok(())
}

/// Download and install the dataset only
pub async fn fetch(config: &Config, progress: &dyn ProgressSink) -> Result<()> {
    println!("{} Downloading {}...", "↓".cyan(), config.require_source_url()?);

    let client = pipeline::http_client(config)?;
    let acquired = pipeline::acquire(config, &client, progress).await?;

    print_acquired(&acquired);
    Ok(())
}

fn print_acquired(acquired: &AcquireReport) {
    println!(
        "{} {} ({}) installed",
        "✓".green(),
        acquired.dataset_path.display(),
        format_bytes(acquired.downloaded_bytes)
    );
    println!("  SHA-256: {}", acquired.sha256);
    match acquired.backup_path {
        Some(ref backup) => println!("  Backup:  {}", backup.display()),
        None => println!("  Backup:  none (first install)"),
    }
}
