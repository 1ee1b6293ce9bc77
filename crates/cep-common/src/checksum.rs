//! SHA-256 helpers for dataset verification

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

/// Incremental SHA-256 over data arriving in chunks
#[derive(Default, Clone)]
pub struct StreamingSha256 {
    hasher: Sha256,
}

impl StreamingSha256 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Lowercase hex digest of everything fed so far
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Check that a string looks like a hex SHA-256 digest and lowercase it
pub fn normalize_sha256(digest: &str) -> Result<String> {
    let digest = digest.trim();
    if digest.len() != SHA256_HEX_LEN || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CommonError::InvalidChecksum(digest.to_string()));
    }
    Ok(digest.to_ascii_lowercase())
}

/// Compare a computed digest against an expected one (case-insensitive)
pub fn verify_sha256(actual: &str, expected: &str) -> Result<()> {
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: expected.trim().to_string(),
            actual: actual.to_string(),
        })
    }
}
