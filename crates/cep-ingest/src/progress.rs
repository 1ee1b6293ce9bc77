//! Progress reporting for downloads and file copies
//!
//! Data paths report `(bytes_so_far, total, label)` to a [`ProgressSink`]
//! after every chunk. Rendering lives behind the trait so library code never
//! touches the terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Receiver of progress updates
pub trait ProgressSink: Send + Sync {
    /// `total` is `None` when the size is unknown
    fn update(&self, transferred: u64, total: Option<u64>, label: &str);

    /// The stage named `label` is done
    fn finish(&self, _label: &str) {}
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _transferred: u64, _total: Option<u64>, _label: &str) {}
}

/// Draws one indicatif bar per stage label
///
/// A known total gets a byte bar; an unknown total gets a spinner showing the
/// bytes seen so far.
#[derive(Default)]
pub struct ConsoleProgress {
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, transferred: u64, total: Option<u64>, label: &str) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let stale = current.as_ref().is_some_and(|(active, _)| active != label);
        if stale {
            if let Some((_, bar)) = current.take() {
                bar.finish();
            }
        }

        let (_, bar) = current.get_or_insert_with(|| {
            let bar = match total {
                Some(size) => create_download_progress(size, label),
                None => create_byte_spinner(label),
            };
            (label.to_string(), bar)
        });
        bar.set_position(transferred);
    }

    fn finish(&self, label: &str) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.as_ref().is_some_and(|(active, _)| active == label) {
            if let Some((_, bar)) = current.take() {
                bar.finish();
            }
        }
    }
}

/// Create a progress bar for a transfer of known size
pub fn create_download_progress(size: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for a transfer of unknown size
pub fn create_byte_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Records every update, for tests
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingProgress {
    pub events: Mutex<Vec<(u64, Option<u64>, String)>>,
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn update(&self, transferred: u64, total: Option<u64>, label: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((transferred, total, label.to_string()));
    }
}
