//! Installing a downloaded dataset as the live file
//!
//! The live file is replaced in an order that never leaves the target path
//! missing:
//!
//! 1. copy the new bytes into a staging file beside the target and fsync it
//! 2. delete a stale `<target>.old`, aborting if that fails
//! 3. hard-link the live file to `<target>.old` (copy when links are refused)
//! 4. rename the staging file over the target
//!
//! A failure in step 1 or 2 leaves live and backup untouched. A failure in
//! step 4 leaves the old live file in place and a fresh copy of it as backup.
//! Exactly one previous generation is kept.

use crate::error::FilesystemError;
use crate::progress::ProgressSink;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

type FsResult<T> = std::result::Result<T, FilesystemError>;

/// Appended to the target's file name to form the backup path
pub const BACKUP_SUFFIX: &str = ".old";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Mode of a first install; later installs keep the live file's mode
#[cfg(unix)]
const DATASET_MODE: u32 = 0o644;

/// What [`install`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub target: PathBuf,
    pub bytes: u64,
    /// Set when a previous live file was retained
    pub backup: Option<PathBuf>,
}

/// `<target>.old`
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Install the file at `source` as `target`, keeping the previous target as
/// its `.old` backup
///
/// `source` is only read; deleting it is up to the caller.
#[instrument(skip_all, fields(source = %source.display(), target = %target.display()))]
pub fn install(source: &Path, target: &Path, progress: &dyn ProgressSink) -> FsResult<InstallOutcome> {
    let dir = parent_dir(target);
    fs::create_dir_all(dir).map_err(|source| FilesystemError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let live = live_metadata(target)?;
    let permissions = staged_permissions(live.as_ref());
    let (staged, bytes) = stage_copy(source, dir, target, permissions, progress)?;

    let backup = if live.is_some() {
        let backup = backup_path(target);
        remove_stale_backup(&backup)?;
        preserve_live(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    staged.persist(target).map_err(|e| FilesystemError::Rename {
        from: e.file.path().to_path_buf(),
        to: target.to_path_buf(),
        source: e.error,
    })?;
    sync_dir(dir);

    info!(bytes, backup = ?backup, "Dataset installed");

    Ok(InstallOutcome {
        target: target.to_path_buf(),
        bytes,
        backup,
    })
}

/// Copy `source` into a new staging file in `dir`, reporting progress
fn stage_copy(
    source: &Path,
    dir: &Path,
    target: &Path,
    permissions: Option<fs::Permissions>,
    progress: &dyn ProgressSink,
) -> FsResult<(NamedTempFile, u64)> {
    let mut reader = File::open(source).map_err(|e| FilesystemError::Open {
        path: source.to_path_buf(),
        source: e,
    })?;
    let total = reader.metadata().ok().map(|m| m.len());

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".staged")
        .tempfile_in(dir)
        .map_err(|e| FilesystemError::CreateTemp {
            dir: dir.to_path_buf(),
            source: e,
        })?;

    let copy_error = |e: std::io::Error| FilesystemError::Copy {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };

    let label = format!("Installing {}", target.display());
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    progress.update(0, total, &label);
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(copy_error(e)),
        };
        staged.write_all(&buffer[..read]).map_err(copy_error)?;
        copied += read as u64;
        progress.update(copied, total, &label);
    }

    if let Some(permissions) = permissions {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| FilesystemError::Permissions {
                path: staged.path().to_path_buf(),
                source: e,
            })?;
    }

    staged.as_file().sync_all().map_err(|e| FilesystemError::Sync {
        path: staged.path().to_path_buf(),
        source: e,
    })?;
    progress.finish(&label);

    debug!(copied, staged = %staged.path().display(), "Staged new dataset");
    Ok((staged, copied))
}

/// Metadata of the live file, `None` when there is none yet
fn live_metadata(target: &Path) -> FsResult<Option<fs::Metadata>> {
    match fs::metadata(target) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FilesystemError::Stat {
            path: target.to_path_buf(),
            source: e,
        }),
    }
}

/// Staging files are created owner-only; the installed file should not be
fn staged_permissions(live: Option<&fs::Metadata>) -> Option<fs::Permissions> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(
            live.map(|m| m.permissions())
                .unwrap_or_else(|| fs::Permissions::from_mode(DATASET_MODE)),
        )
    }
    #[cfg(not(unix))]
    {
        live.map(|m| m.permissions())
    }
}

fn remove_stale_backup(backup: &Path) -> FsResult<()> {
    match fs::remove_file(backup) {
        Ok(()) => {
            info!(path = %backup.display(), "Deleted stale backup");
            Ok(())
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FilesystemError::RemoveBackup {
            path: backup.to_path_buf(),
            source: e,
        }),
    }
}

fn preserve_live(live: &Path, backup: &Path) -> FsResult<()> {
    match fs::hard_link(live, backup) {
        Ok(()) => {
            debug!(live = %live.display(), backup = %backup.display(), "Linked live dataset as backup");
            Ok(())
        },
        Err(link_err) => {
            debug!(error = %link_err, "Hard link refused, copying live dataset to backup");
            fs::copy(live, backup).map(|_| ()).map_err(|e| {
                let _ = fs::remove_file(backup);
                FilesystemError::Backup {
                    live: live.to_path_buf(),
                    backup: backup.to_path_buf(),
                    source: e,
                }
            })
        },
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Persist the rename itself; failure only weakens durability
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "Failed to fsync dataset directory");
    }
    #[cfg(not(unix))]
    let _ = dir;
}
