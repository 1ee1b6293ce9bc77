//! Configuration management
//!
//! Settings come from a `.env` file and the environment, falling back to the
//! defaults below. CLI flags override single fields after loading.

use crate::error::{CepError, Result};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default location of the live dataset file.
pub const DEFAULT_DATASET_PATH: &str = "./data/ceps.csv";

/// Default SQLite database file.
pub const DEFAULT_SQLITE_PATH: &str = "./data/ceps.db";

/// Default HTTP timeout in seconds. Full CEP dumps are a few hundred MB.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Default field delimiter of the dataset file.
pub const DEFAULT_CSV_DELIMITER: u8 = b',';

/// Ingest configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote dataset URL; only needed to fetch
    pub source_url: Option<String>,

    /// Live dataset file; the backup sits next to it with `.old` appended
    pub dataset_path: PathBuf,

    /// Private directory for in-flight downloads
    pub scratch_dir: PathBuf,

    pub sqlite_path: PathBuf,

    /// Expected SHA-256 of the download, lowercase hex
    pub expected_sha256: Option<String>,

    pub http_timeout_secs: u64,

    pub csv_delimiter: u8,
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the environment only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = env_non_empty("CEP_SOURCE_URL") {
            config.source_url = Some(url);
        }

        if let Ok(path) = std::env::var("CEP_DATASET_PATH") {
            config.dataset_path = PathBuf::from(path);
        }

        if let Some(dir) = env_non_empty("CEP_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }

        if let Some(path) = env_non_empty("SQLITE_PATH") {
            config.sqlite_path = PathBuf::from(path);
        }

        if let Some(digest) = env_non_empty("CEP_DATASET_SHA256") {
            config.expected_sha256 = Some(digest);
        }

        if let Ok(secs) = std::env::var("CEP_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = secs.trim().parse().map_err(|_| {
                CepError::config(format!("CEP_HTTP_TIMEOUT_SECS must be a number, got '{}'", secs))
            })?;
        }

        if let Ok(delimiter) = std::env::var("CEP_CSV_DELIMITER") {
            config.csv_delimiter = parse_delimiter(&delimiter)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration, normalizing the expected digest
    pub fn validate(&mut self) -> Result<()> {
        if self.dataset_path.as_os_str().is_empty() {
            return Err(CepError::config("Dataset path cannot be empty"));
        }

        if self.http_timeout_secs == 0 {
            return Err(CepError::config("HTTP timeout must be greater than 0"));
        }

        if !self.csv_delimiter.is_ascii() {
            return Err(CepError::config("CSV delimiter must be a single ASCII character"));
        }

        if let Some(ref digest) = self.expected_sha256 {
            let normalized = cep_common::checksum::normalize_sha256(digest)
                .map_err(|e| CepError::config(e.to_string()))?;
            self.expected_sha256 = Some(normalized);
        }

        if let Some(ref url) = self.source_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CepError::config(format!(
                    "Source URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }

    /// The source URL, or an error naming the variable to set
    pub fn require_source_url(&self) -> Result<&str> {
        self.source_url
            .as_deref()
            .ok_or_else(|| CepError::config("CEP_SOURCE_URL is not set"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: None,
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            scratch_dir: default_scratch_dir(),
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            expected_sha256: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            csv_delimiter: DEFAULT_CSV_DELIMITER,
        }
    }
}

/// `<user cache dir>/cep/tmp`, or the system temp dir when there is none
pub fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("cep").join("tmp"))
        .unwrap_or_else(|| std::env::temp_dir().join("cep"))
}

/// Parse a one-character delimiter; `\t` and `tab` mean a tab
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {},
    }

    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(CepError::config(format!(
            "CSV delimiter must be a single ASCII character, got '{}'",
            raw
        ))),
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "CEP_SOURCE_URL",
        "CEP_DATASET_PATH",
        "CEP_SCRATCH_DIR",
        "SQLITE_PATH",
        "CEP_DATASET_SHA256",
        "CEP_HTTP_TIMEOUT_SECS",
        "CEP_CSV_DELIMITER",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert!(config.source_url.is_none());
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.sqlite_path, PathBuf::from(DEFAULT_SQLITE_PATH));
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert_eq!(config.csv_delimiter, b',');
        assert!(config.require_source_url().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("CEP_SOURCE_URL", "https://example.com/ceps.csv");
        std::env::set_var("CEP_DATASET_PATH", "/srv/cep/ceps.csv");
        std::env::set_var("SQLITE_PATH", "/srv/cep/ceps.db");
        std::env::set_var("CEP_HTTP_TIMEOUT_SECS", "30");
        std::env::set_var("CEP_CSV_DELIMITER", ";");
        std::env::set_var("CEP_DATASET_SHA256", "AB".repeat(32));

        let config = Config::from_env().unwrap();
        assert_eq!(config.require_source_url().unwrap(), "https://example.com/ceps.csv");
        assert_eq!(config.dataset_path, PathBuf::from("/srv/cep/ceps.csv"));
        assert_eq!(config.sqlite_path, PathBuf::from("/srv/cep/ceps.db"));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.csv_delimiter, b';');
        assert_eq!(config.expected_sha256, Some("ab".repeat(32)));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_rejected() {
        clear_env();
        std::env::set_var("CEP_HTTP_TIMEOUT_SECS", "0");
        assert!(Config::from_env().is_err());
        clear_env();

        std::env::set_var("CEP_CSV_DELIMITER", ";;");
        assert!(Config::from_env().is_err());
        clear_env();

        std::env::set_var("CEP_SOURCE_URL", "ftp://example.com/ceps.csv");
        assert!(Config::from_env().is_err());
        clear_env();

        std::env::set_var("CEP_DATASET_SHA256", "not-a-digest");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("§").is_err());
    }
}
