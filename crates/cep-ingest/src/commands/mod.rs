//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod load;
pub mod lookup;
pub mod refresh;

use crate::progress::{ConsoleProgress, NoProgress, ProgressSink};

/// Console bars unless `quiet` is set
pub fn progress_sink(quiet: bool) -> Box<dyn ProgressSink> {
    if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::new())
    }
}
