//! `cep-ingest load` command implementation
//!
//! Loads a local dataset file without downloading anything.

use crate::config::Config;
use crate::error::Result;
use crate::pipeline;
use crate::store::CepStore;
use colored::Colorize;
use std::path::PathBuf;

pub async fn run(config: &Config, store: &CepStore, file: Option<PathBuf>) -> Result<()> {
    let path = file.unwrap_or_else(|| config.dataset_path.clone());
    println!("{} Loading {}...", "→".cyan(), path.display());

    let applied = pipeline::load(config, store, &path).await?;
    let total = store.count().await?;

    println!("{} {} record(s) applied, {} row(s) in store", "✓".green(), applied, total);
    Ok(())
}
