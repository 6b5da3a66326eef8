//! Atomic JSON document persistence.
//!
//! Records are written to a sibling temp file and renamed into place so a crash
//! mid-save never leaves a truncated document. There is no cross-process
//! locking: concurrent writers race and the last rename wins.

use crate::core::error::TesseraError;
use crate::core::time::new_event_id;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Load a JSON document, returning `None` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, TesseraError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TesseraError::IoError(e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write a JSON document atomically (temp file + rename in the same directory).
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TesseraError> {
    let parent = path.parent().ok_or_else(|| {
        TesseraError::ValidationError(format!("no parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, new_event_id()));
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&body)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(TesseraError::IoError(e));
    }
    Ok(())
}

/// Opaque key-value document store: one `<key>.json` file per record.
#[derive(Debug, Clone)]
pub struct DocStore {
    root: PathBuf,
}

impl DocStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TesseraError> {
        load_json(&self.path_for(key))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), TesseraError> {
        save_json(&self.path_for(key), value)
    }

    /// Returns whether a record was deleted.
    pub fn delete(&self, key: &str) -> Result<bool, TesseraError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TesseraError::IoError(e)),
        }
    }

    /// Sorted keys of every stored record.
    pub fn keys(&self) -> Result<Vec<String>, TesseraError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TesseraError::IoError(e)),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
