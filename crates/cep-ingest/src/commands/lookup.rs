//! `cep-ingest lookup` and `cep-ingest delete`

use crate::error::{CepError, Result};
use crate::record::Cep;
use crate::store::CepStore;
use colored::Colorize;

/// Print the stored record for `cep` as JSON
pub async fn run(store: &CepStore, cep: &str) -> Result<()> {
    let cep = Cep::parse(cep)?;

    match store.read(&cep).await? {
        Some(record) => {
            let rendered = serde_json::to_string_pretty(&record)
                .map_err(|e| CepError::config(format!("Failed to render record: {}", e)))?;
            println!("{}", rendered);
        },
        None => println!("{} No record for {}", "✗".yellow(), cep),
    }

    Ok(())
}

/// Remove the stored record for `cep`
pub async fn delete(store: &CepStore, cep: &str) -> Result<()> {
    let cep = Cep::parse(cep)?;

    if store.delete(&cep).await? {
        println!("{} Deleted {}", "✓".green(), cep);
    } else {
        println!("{} No record for {}", "✗".yellow(), cep);
    }

    Ok(())
}
