//! CEP Common Library
//!
//! Shared utilities for the CEP workspace.
//!
//! - **Logging**: `tracing` subscriber setup for binaries
//! - **Checksums**: SHA-256 helpers for dataset verification
//! - **Error Handling**: error type for the helpers above
//!
//! # Example
//!
//! ```no_run
//! use cep_common::checksum;
//!
//! fn verify(body: &[u8], expected: &str) -> cep_common::Result<()> {
//!     let mut digest = checksum::StreamingSha256::new();
//!     digest.update(body);
//!     checksum::verify_sha256(&digest.finalize_hex(), expected)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
