//! Error types for dataset refreshes
//!
//! Each failing step maps to one variant carrying the path, URL or CEP it was
//! working on, so the single error a caller sees names the step that broke.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, CepError>;

/// Network and status failures while fetching the remote dataset
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Could not connect to '{url}': {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server answered '{url}' with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Response body from '{url}' broke off: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Response from '{url}' declared {expected} bytes but carried {actual}")]
    LengthMismatch { url: String, expected: u64, actual: u64 },
}

/// Create, write, copy, rename and delete failures on the local filesystem
#[derive(Error, Debug)]
pub enum FilesystemError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create temporary file in '{dir}': {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to inspect '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set permissions on '{path}': {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to flush '{path}' to disk: {source}")]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete stale backup '{path}': {source}")]
    RemoveBackup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to preserve '{live}' as backup '{backup}': {source}")]
    Backup {
        live: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move '{from}' into place at '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Connection, statement and transaction failures in the record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Failed to create the ceps table: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),

    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("Failed to prepare upsert statement: {0}")]
    Prepare(#[source] sqlx::Error),

    #[error("Failed to apply record {cep}: {source}")]
    Exec {
        cep: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("Record {0} already exists")]
    AlreadyExists(String),

    #[error("Stored row has malformed CEP '{cep}'")]
    InvalidRow { cep: String },

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Top-level error for every ingest operation
#[derive(Error, Debug)]
pub enum CepError {
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Filesystem operation failed: {0}")]
    Filesystem(#[from] FilesystemError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid CEP '{0}': expected eight digits, optionally written as 00000-000")]
    InvalidCep(String),

    #[error("Failed to parse dataset at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Dataset verification failed: {0}")]
    Checksum(#[from] cep_common::CommonError),

    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),
}

impl CepError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
