//! Store catalogs.
//!
//! A catalog is a directory of stores, one subdirectory per store ID:
//!
//! ```text
//! <catalog>/<id>/meta.json
//! <catalog>/<id>/track.json
//! <catalog>/<id>/overlay/...
//! ```
//!
//! Global and component catalogs are the same capability behind an explicit
//! [`Scope`] tag.

use crate::core::error::TesseraError;
use crate::core::fsops;
use crate::core::persist::{load_json, save_json};
use crate::core::store::{Scope, StoreMeta, TrackManifest};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const META_FILE: &str = "meta.json";
const TRACK_FILE: &str = "track.json";
const OVERLAY_DIR: &str = "overlay";

/// Capability interface over one scope's stores.
pub trait Catalog {
    fn scope(&self) -> Scope;
    fn exists(&self, id: &str) -> bool;
    fn list(&self) -> Result<Vec<String>, TesseraError>;
    fn create(&self, id: &str, meta: &StoreMeta) -> Result<(), TesseraError>;
    fn load_meta(&self, id: &str) -> Result<StoreMeta, TesseraError>;
    fn save_meta(&self, id: &str, meta: &StoreMeta) -> Result<(), TesseraError>;
    fn load_track(&self, id: &str) -> Result<TrackManifest, TesseraError>;
    fn save_track(&self, id: &str, manifest: &TrackManifest) -> Result<(), TesseraError>;
    fn overlay_root(&self, id: &str) -> PathBuf;
    fn delete(&self, id: &str) -> Result<(), TesseraError>;
}

/// Reject IDs that are unsafe as directory names.
pub fn validate_store_id(id: &str) -> Result<(), TesseraError> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("store id pattern is valid")
    });
    if !re.is_match(id) {
        return Err(TesseraError::ValidationError(format!(
            "invalid store id '{}': use letters, digits, '.', '_' or '-' (max 64, must start alphanumeric)",
            id
        )));
    }
    Ok(())
}

/// Directory-backed catalog.
#[derive(Debug, Clone)]
pub struct DirCatalog {
    scope: Scope,
    root: PathBuf,
}

impl DirCatalog {
    pub fn new(scope: Scope, root: impl Into<PathBuf>) -> Self {
        Self {
            scope,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn not_found(&self, id: &str) -> TesseraError {
        TesseraError::NotFound(format!("store '{}' in {} scope", id, self.scope))
    }
}

impl Catalog for DirCatalog {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn exists(&self, id: &str) -> bool {
        validate_store_id(id).is_ok() && self.store_dir(id).join(META_FILE).is_file()
    }

    fn list(&self) -> Result<Vec<String>, TesseraError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TesseraError::IoError(e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let id = entry?.file_name().to_string_lossy().into_owned();
            if self.exists(&id) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn create(&self, id: &str, meta: &StoreMeta) -> Result<(), TesseraError> {
        validate_store_id(id)?;
        if self.exists(id) {
            return Err(TesseraError::ValidationError(format!(
                "store '{}' already exists in {} scope",
                id, self.scope
            )));
        }
        fs::create_dir_all(self.overlay_root(id))?;
        save_json(&self.store_dir(id).join(TRACK_FILE), &TrackManifest::default())?;
        save_json(&self.store_dir(id).join(META_FILE), meta)
    }

    fn load_meta(&self, id: &str) -> Result<StoreMeta, TesseraError> {
        validate_store_id(id)?;
        load_json(&self.store_dir(id).join(META_FILE))?.ok_or_else(|| self.not_found(id))
    }

    fn save_meta(&self, id: &str, meta: &StoreMeta) -> Result<(), TesseraError> {
        validate_store_id(id)?;
        save_json(&self.store_dir(id).join(META_FILE), meta)
    }

    fn load_track(&self, id: &str) -> Result<TrackManifest, TesseraError> {
        if !self.exists(id) {
            return Err(self.not_found(id));
        }
        Ok(load_json(&self.store_dir(id).join(TRACK_FILE))?.unwrap_or_default())
    }

    fn save_track(&self, id: &str, manifest: &TrackManifest) -> Result<(), TesseraError> {
        if !self.exists(id) {
            return Err(self.not_found(id));
        }
        save_json(&self.store_dir(id).join(TRACK_FILE), manifest)
    }

    fn overlay_root(&self, id: &str) -> PathBuf {
        self.store_dir(id).join(OVERLAY_DIR)
    }

    fn delete(&self, id: &str) -> Result<(), TesseraError> {
        if !self.exists(id) {
            return Err(self.not_found(id));
        }
        fsops::remove_path(&self.store_dir(id))?;
        Ok(())
    }
}

/// The catalogs visible from one repository.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub global: DirCatalog,
    /// Present only when the repository exposes a component catalog directory.
    pub component: Option<DirCatalog>,
}

impl Catalogs {
    pub fn get(&self, scope: Scope) -> Option<&DirCatalog> {
        match scope {
            Scope::Global => Some(&self.global),
            Scope::Component => self.component.as_ref(),
        }
    }

    /// Like [`Catalogs::get`], but a missing component catalog is an error.
    pub fn require(&self, scope: Scope) -> Result<&DirCatalog, TesseraError> {
        self.get(scope).ok_or_else(|| {
            TesseraError::NotFound(
                "this repository has no component catalog (create the component directory first)"
                    .to_string(),
            )
        })
    }

    pub fn all(&self) -> Vec<&DirCatalog> {
        let mut out = vec![&self.global];
        if let Some(component) = &self.component {
            out.push(component);
        }
        out
    }
}
