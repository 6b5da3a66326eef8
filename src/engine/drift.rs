//! Drift detection: workspace content versus store overlay content.

use crate::core::error::TesseraError;
use crate::core::fsops;
use crate::core::paths::is_covered_by;
use crate::core::store::{Mode, Scope, StoreRef};
use crate::engine::catalog::Catalog;
use crate::engine::context::Engine;
use crate::engine::diff::{FileDiff, diff_file};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Unchanged,
    /// Only in the workspace.
    Added,
    /// Only in the overlay.
    Removed,
    Modified,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDrift {
    pub path: String,
    pub status: DriftStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<FileDiff>,
}

#[derive(Debug, Clone, Default)]
pub struct DiffRequest {
    /// Restrict to these declared paths (or files beneath them).
    pub paths: Vec<String>,
    pub store: Option<String>,
    pub scope: Option<Scope>,
    /// Attach unified diffs for changed files.
    pub patch: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub store: StoreRef,
    pub files: Vec<FileDrift>,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffResult {
    pub fn count(&self, status: DriftStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    pub fn has_drift(&self) -> bool {
        self.files.iter().any(|f| f.status != DriftStatus::Unchanged)
    }
}

pub fn diff(engine: &Engine, req: DiffRequest) -> Result<DiffResult, TesseraError> {
    let state = engine.load_state()?;
    let (store, catalog) = engine.target_store(state.as_ref(), req.store.as_deref(), req.scope)?;
    let manifest = catalog.load_track(&store.id)?;
    let overlay_root = catalog.overlay_root(&store.id);
    let filters = engine.resolve_paths(&req.paths)?;

    let mut files = BTreeSet::new();
    for declared in manifest.paths() {
        let in_scope = filters.is_empty()
            || filters
                .iter()
                .any(|f| is_covered_by(declared, f) || is_covered_by(f, declared));
        if !in_scope {
            continue;
        }
        for rel in expand(declared, &engine.workspace_path(declared), &overlay_root.join(declared))? {
            if filters.is_empty() || filters.iter().any(|f| is_covered_by(&rel, f)) {
                files.insert(rel);
            }
        }
    }

    let mut result = DiffResult {
        store,
        files: Vec::new(),
        additions: 0,
        deletions: 0,
    };
    for rel in files {
        let workspace = read_optional(&engine.workspace_path(&rel))?;
        let overlay = read_optional(&overlay_root.join(&rel))?;
        let status = classify(overlay.as_deref(), workspace.as_deref());
        let diff = if req.patch && status != DriftStatus::Unchanged {
            let d = diff_file(&rel, overlay.as_deref(), workspace.as_deref());
            result.additions += d.additions;
            result.deletions += d.deletions;
            Some(d)
        } else {
            None
        };
        result.files.push(FileDrift {
            path: rel,
            status,
            diff,
        });
    }
    tracing::debug!(
        store = %result.store,
        files = result.files.len(),
        drifted = result.files.iter().filter(|f| f.status != DriftStatus::Unchanged).count(),
        "computed drift"
    );
    Ok(result)
}

/// Compare by content hash; absent on both sides counts as unchanged.
pub fn classify(overlay: Option<&[u8]>, workspace: Option<&[u8]>) -> DriftStatus {
    match (overlay, workspace) {
        (None, None) => DriftStatus::Unchanged,
        (None, Some(_)) => DriftStatus::Added,
        (Some(_), None) => DriftStatus::Removed,
        (Some(a), Some(b)) => {
            if fsops::sha256_bytes(a) == fsops::sha256_bytes(b) {
                DriftStatus::Unchanged
            } else {
                DriftStatus::Modified
            }
        }
    }
}

/// A declared path expands to itself, or to every file beneath it on either side.
fn expand(declared: &str, workspace: &Path, overlay: &Path) -> Result<Vec<String>, TesseraError> {
    if !workspace.is_dir() && !overlay.is_dir() {
        return Ok(vec![declared.to_string()]);
    }
    let mut out = BTreeSet::new();
    for side in [workspace, overlay] {
        if side.is_dir() {
            for rel in fsops::list_files(side)? {
                out.insert(format!("{}/{}", declared, rel));
            }
        }
    }
    Ok(out.into_iter().collect())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, TesseraError> {
    if path.is_dir() {
        return Ok(None);
    }
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TesseraError::IoError(e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathHealth {
    Ok,
    Missing,
    /// A symlink entry is no longer a symlink.
    TypeChanged,
    /// A copied file no longer matches its recorded checksum.
    Drifted,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathStatus {
    pub path: String,
    pub store: String,
    pub mode: Mode,
    pub health: PathHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub workspace_id: String,
    pub workspace_root: String,
    pub recorded: bool,
    pub applied: bool,
    pub mode: Mode,
    pub active_store: Option<StoreRef>,
    pub stack: Vec<String>,
    pub owned_per_store: BTreeMap<String, usize>,
    pub paths: Vec<PathStatus>,
}

impl StatusResult {
    pub fn unhealthy(&self) -> impl Iterator<Item = &PathStatus> {
        self.paths.iter().filter(|p| p.health != PathHealth::Ok)
    }
}

/// Summarize the workspace record and check each ledger path on disk, using
/// recorded checksums instead of re-reading store content.
pub fn status(engine: &Engine) -> Result<StatusResult, TesseraError> {
    let Some(state) = engine.load_state()? else {
        return Ok(StatusResult {
            workspace_id: engine.workspace_id.clone(),
            workspace_root: engine.workspace_root.display().to_string(),
            recorded: false,
            applied: false,
            mode: engine.config.default_mode,
            active_store: None,
            stack: Vec::new(),
            owned_per_store: BTreeMap::new(),
            paths: Vec::new(),
        });
    };
    let mut owned_per_store = BTreeMap::new();
    let mut paths = Vec::with_capacity(state.paths.len());
    for (rel, owner) in &state.paths {
        *owned_per_store.entry(owner.store.clone()).or_insert(0) += 1;
        let dest = engine.workspace_path(rel);
        let health = if !fsops::entry_exists(&dest) {
            PathHealth::Missing
        } else if owner.kind == Mode::Symlink && !fsops::is_symlink(&dest) {
            PathHealth::TypeChanged
        } else if let (Mode::Copy, Some(expected)) = (owner.kind, owner.checksum.as_deref()) {
            match fsops::sha256_file(&dest) {
                Ok(actual) if actual == expected => PathHealth::Ok,
                _ => PathHealth::Drifted,
            }
        } else {
            PathHealth::Ok
        };
        paths.push(PathStatus {
            path: rel.clone(),
            store: owner.store.clone(),
            mode: owner.kind,
            health,
        });
    }
    Ok(StatusResult {
        workspace_id: state.workspace_id.clone(),
        workspace_root: engine.workspace_root.display().to_string(),
        recorded: true,
        applied: state.applied,
        mode: state.mode,
        active_store: state.active_store.as_ref().map(|id| StoreRef {
            id: id.clone(),
            scope: state.active_store_scope.unwrap_or(Scope::Global),
        }),
        stack: state.stack.clone(),
        owned_per_store,
        paths,
    })
}
