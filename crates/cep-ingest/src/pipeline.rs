//! Refresh pipeline: download, install, parse, load
//!
//! Stages run one after another and the first failure ends the run. A failed
//! download or checksum never touches the live file; a failed load leaves the
//! store as it was.

use crate::config::Config;
use crate::error::{CepError, Result};
use crate::parser;
use crate::progress::ProgressSink;
use crate::replace::{self, InstallOutcome};
use crate::store::CepStore;
use crate::transfer;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const USER_AGENT: &str = concat!("cep-ingest/", env!("CARGO_PKG_VERSION"));

/// Result of downloading and installing a dataset
#[derive(Debug, Clone, Serialize)]
pub struct AcquireReport {
    pub downloaded_bytes: u64,
    pub sha256: String,
    pub dataset_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

/// Result of a full refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    #[serde(flatten)]
    pub acquired: AcquireReport,
    /// Records applied by the upsert
    pub records_applied: u64,
    /// Rows in the store afterwards
    pub rows_total: u64,
}

/// HTTP client with the configured timeout
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.http_timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CepError::config(format!("Failed to build HTTP client: {}", e)))
}

/// Download the configured dataset and install it as the live file
#[instrument(skip_all)]
pub async fn acquire(
    config: &Config,
    client: &Client,
    progress: &dyn ProgressSink,
) -> Result<AcquireReport> {
    let url = config.require_source_url()?;
    let dataset = transfer::fetch(client, url, &config.scratch_dir, progress).await?;

    if let Some(ref expected) = config.expected_sha256 {
        cep_common::checksum::verify_sha256(dataset.sha256(), expected)?;
        info!(sha256 = %dataset.sha256(), "Checksum verified");
    }

    let InstallOutcome { target, backup, .. } =
        replace::install(dataset.path(), &config.dataset_path, progress)?;

    let report = AcquireReport {
        downloaded_bytes: dataset.size(),
        sha256: dataset.sha256().to_string(),
        dataset_path: target,
        backup_path: backup,
    };

    if let Err(e) = dataset.discard() {
        warn!(error = %e, "Failed to remove downloaded temporary file");
    }

    Ok(report)
}

/// Parse the dataset at `path` and upsert every record into `store`
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load(config: &Config, store: &CepStore, path: &Path) -> Result<u64> {
    let records = parser::parse_file(path, config.csv_delimiter)?;
    let applied = store.upsert_all(&records).await?;
    info!(applied, "Dataset loaded into store");
    Ok(applied)
}

/// Run a full refresh cycle
#[instrument(skip_all, fields(dataset = %config.dataset_path.display()))]
pub async fn refresh(
    config: &Config,
    store: &CepStore,
    client: &Client,
    progress: &dyn ProgressSink,
) -> Result<RefreshReport> {
    let acquired = acquire(config, client, progress).await?;
    let records_applied = load(config, store, &acquired.dataset_path).await?;
    let rows_total = store.count().await?;

    info!(
        bytes = acquired.downloaded_bytes,
        records_applied,
        rows_total,
        "Refresh complete"
    );

    Ok(RefreshReport {
        acquired,
        records_applied,
        rows_total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            dataset_path: dir.path().join("ceps.csv"),
            scratch_dir: dir.path().join("scratch"),
            ..Config::default()
        }
    }

    #[test]
    fn test_http_client_builds() {
        assert!(http_client(&Config::default()).is_ok());
    }

    #[tokio::test]
    async fn test_acquire_without_url_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let client = http_client(&config).unwrap();

        let err = acquire(&config, &client, &crate::progress::NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, CepError::Config(_)));
        assert!(!config.dataset_path.exists());
    }

    #[tokio::test]
    async fn test_load_local_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(
            &config.dataset_path,
            "cep,bairro\n01310000,Bela Vista\n20040002,Centro\n",
        )
        .unwrap();
        let store = CepStore::in_memory().await.unwrap();

        let applied = load(&config, &store, &config.dataset_path).await.unwrap();

        assert_eq!(applied, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_parse_error_leaves_store_empty() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.dataset_path, "cep,bairro\n01310000,Bela Vista\nbad,Centro\n").unwrap();
        let store = CepStore::in_memory().await.unwrap();

        let err = load(&config, &store, &config.dataset_path).await.unwrap_err();

        assert!(matches!(err, CepError::Parse { line: 3, .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
