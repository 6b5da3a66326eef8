//! Repository discovery and fingerprinting.

use crate::core::error::TesseraError;
use crate::core::fsops::sha256_bytes;
use std::path::{Path, PathBuf};

/// A discovered repository.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Canonical repository root.
    pub root: PathBuf,
    /// Stable identifier for this checkout.
    pub fingerprint: String,
}

/// Walk up from `start` until a directory containing `.git` is found.
pub fn discover(start: &Path) -> Result<RepoContext, TesseraError> {
    let start = std::fs::canonicalize(start).map_err(TesseraError::IoError)?;
    let mut current = start.clone();
    loop {
        if current.join(".git").exists() {
            return Ok(RepoContext {
                fingerprint: fingerprint(&current),
                root: current,
            });
        }
        if !current.pop() {
            return Err(TesseraError::NotInRepository(start));
        }
    }
}

/// Fingerprint of a repository checkout: SHA-256 of its canonical root path.
pub fn fingerprint(root: &Path) -> String {
    sha256_bytes(root.to_string_lossy().as_bytes())
}
