//! CEP Ingest Library
//!
//! Keeps a local SQLite table of Brazilian postal codes (CEPs) in step with a
//! remote dataset file.
//!
//! # Overview
//!
//! A refresh runs four stages in order:
//!
//! - **Fetch**: stream the remote file into a private scratch file ([`transfer`])
//! - **Install**: swap it in as the live dataset, keeping one `.old` backup ([`replace`])
//! - **Parse**: read the delimited dataset into [`Record`]s ([`parser`])
//! - **Load**: upsert every record in a single transaction ([`store`])
//!
//! # Example
//!
//! ```no_run
//! use cep_ingest::{config::Config, pipeline, progress::NoProgress, store::CepStore};
//!
//! #[tokio::main]
//! async fn main() -> cep_ingest::Result<()> {
//!     let config = Config::load()?;
//!     let store = CepStore::open(&config.sqlite_path).await?;
//!     let client = pipeline::http_client(&config)?;
//!     let report = pipeline::refresh(&config, &store, &client, &NoProgress).await?;
//!     println!("{} rows", report.rows_total);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod replace;
pub mod store;
pub mod transfer;

// Re-export commonly used types
pub use error::{CepError, Result};
pub use record::{Cep, Record};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cep-ingest - refresh and query the local CEP table
#[derive(Parser, Debug)]
#[command(name = "cep-ingest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Remote dataset URL
    #[arg(long, env = "CEP_SOURCE_URL", global = true)]
    pub source_url: Option<String>,

    /// Live dataset file
    #[arg(long, env = "CEP_DATASET_PATH", global = true)]
    pub dataset_path: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "SQLITE_PATH", global = true)]
    pub sqlite_path: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the dataset, install it and load it into the store
    Refresh {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and install the dataset without loading it
    Fetch,

    /// Load a local dataset file into the store
    Load {
        /// Dataset file (defaults to the live dataset)
        file: Option<PathBuf>,
    },

    /// Show the record for a CEP
    Lookup {
        /// CEP, e.g. 01310-000
        cep: String,
    },

    /// Delete the record for a CEP
    Delete {
        /// CEP, e.g. 01310-000
        cep: String,
    },
}

impl Cli {
    /// Apply flag overrides on top of loaded configuration
    pub fn apply_overrides(&self, config: &mut config::Config) -> Result<()> {
        if let Some(ref url) = self.source_url {
            config.source_url = Some(url.clone());
        }
        if let Some(ref path) = self.dataset_path {
            config.dataset_path = path.clone();
        }
        if let Some(ref path) = self.sqlite_path {
            config.sqlite_path = path.clone();
        }
        config.validate()
    }
}
