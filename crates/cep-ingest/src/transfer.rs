//! Streaming download of the remote dataset into a scratch file
//!
//! [`fetch`] either hands back a complete temporary file or fails with no
//! file left behind. The temporary file is removed when the returned
//! [`DownloadedDataset`] is dropped.

use crate::error::{CepError, FilesystemError, Result, TransferError};
use crate::progress::ProgressSink;
use cep_common::checksum::StreamingSha256;
use futures::StreamExt;
use reqwest::Client;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, instrument, warn};

const TEMP_PREFIX: &str = "cep-download-";
const TEMP_SUFFIX: &str = ".tmp";

/// A fully downloaded dataset waiting in the scratch directory
#[derive(Debug)]
pub struct DownloadedDataset {
    path: TempPath,
    size: u64,
    sha256: String,
}

impl DownloadedDataset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex SHA-256 of the body
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Delete the temporary file now, reporting failure
    pub fn discard(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Download `url` into a fresh temporary file under `scratch_dir`
///
/// Fails with `TransferError` when the server can't be reached, answers with
/// a non-success status, drops the body, or sends a different number of bytes
/// than it declared.
#[instrument(skip_all, fields(url = %url, scratch_dir = %scratch_dir.display()))]
pub async fn fetch(
    client: &Client,
    url: &str,
    scratch_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<DownloadedDataset> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| TransferError::Connect {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Status {
            url: url.to_string(),
            status,
        }
        .into());
    }

    let declared = response.content_length();
    debug!(?declared, "Connected, streaming body");

    ensure_private_dir(scratch_dir)?;
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(scratch_dir)
        .map_err(|source| FilesystemError::CreateTemp {
            dir: scratch_dir.to_path_buf(),
            source,
        })?;

    let label = format!("Downloading {}", url);
    let streamed = stream_body(response, &mut temp, url, declared, &label, progress).await;
    progress.finish(&label);

    let (size, sha256) = match streamed {
        Ok(done) => done,
        Err(err) => {
            let path = temp.path().to_path_buf();
            if let Err(cleanup) = temp.close() {
                warn!(path = %path.display(), error = %cleanup, "Failed to remove partial download");
            }
            return Err(err);
        },
    };

    info!(size, sha256 = %sha256, path = %temp.path().display(), "Download complete");

    Ok(DownloadedDataset {
        path: temp.into_temp_path(),
        size,
        sha256,
    })
}

async fn stream_body(
    response: reqwest::Response,
    temp: &mut NamedTempFile,
    url: &str,
    declared: Option<u64>,
    label: &str,
    progress: &dyn ProgressSink,
) -> Result<(u64, String)> {
    let mut digest = StreamingSha256::new();
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    progress.update(0, declared, label);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| TransferError::Body {
            url: url.to_string(),
            source,
        })?;

        temp.write_all(&chunk).map_err(|source| FilesystemError::Write {
            path: temp.path().to_path_buf(),
            source,
        })?;
        digest.update(&chunk);
        written += chunk.len() as u64;
        progress.update(written, declared, label);
    }

    temp.as_file()
        .sync_all()
        .map_err(|source| FilesystemError::Sync {
            path: temp.path().to_path_buf(),
            source,
        })?;

    if let Some(expected) = declared {
        if expected != written {
            return Err(CepError::Transfer(TransferError::LengthMismatch {
                url: url.to_string(),
                expected,
                actual: written,
            }));
        }
    }

    Ok((written, digest.finalize_hex()))
}

/// Create `dir` if missing; new directories are owner-only on Unix
pub fn ensure_private_dir(dir: &Path) -> std::result::Result<(), FilesystemError> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(dir).map_err(|source| FilesystemError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
