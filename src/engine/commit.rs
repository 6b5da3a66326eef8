//! Commit: capture current workspace content into the active store's overlay.
//!
//! Commit records captured paths in the ledger but never marks the workspace
//! applied, so a store can be filled once and applied to many workspaces.

use crate::core::error::TesseraError;
use crate::core::fsops;
use crate::core::paths::{is_ancestor_of, is_covered_by};
use crate::core::store::{Mode, StoreRef};
use crate::core::time::now_epoch_z;
use crate::engine::catalog::Catalog;
use crate::engine::context::Engine;
use crate::engine::state::PathOwnership;
use serde::Serialize;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    /// Declared paths to capture; empty means every declared path plus an overlay prune.
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub store: StoreRef,
    pub captured: Vec<String>,
    /// Already symlinked to the overlay; nothing to copy.
    pub linked: Vec<String>,
    /// Declared but absent from the workspace.
    pub missing: Vec<String>,
    /// Owned in this workspace by another store; left alone.
    pub foreign: Vec<String>,
    /// Overlay entries removed because nothing declares them any more.
    pub pruned: Vec<String>,
}

pub fn commit(engine: &Engine, req: CommitRequest) -> Result<CommitResult, TesseraError> {
    let current = engine.load_state()?;
    let (store, catalog) = engine.target_store(current.as_ref(), None, None)?;
    let mut state = match current {
        Some(state) => state,
        None => engine.state_or_new()?,
    };
    let manifest = catalog.load_track(&store.id)?;
    let full = req.paths.is_empty();
    let selected: Vec<String> = if full {
        manifest.paths().map(str::to_string).collect()
    } else {
        let resolved = engine.resolve_paths(&req.paths)?;
        if let Some(undeclared) = resolved.iter().find(|p| !manifest.contains(p)) {
            return Err(TesseraError::ValidationError(format!(
                "'{}' is not tracked by store '{}'; track it first",
                undeclared, store.id
            )));
        }
        resolved
    };
    let overlay_root = catalog.overlay_root(&store.id);

    engine
        .journal
        .scoped("commit", Some(&engine.workspace_id), Some(&store.id), || {
            let mut result = CommitResult {
                store: store.clone(),
                captured: Vec::new(),
                linked: Vec::new(),
                missing: Vec::new(),
                foreign: Vec::new(),
                pruned: Vec::new(),
            };
            for rel in &selected {
                let src = engine.workspace_path(rel);
                let dst = overlay_root.join(rel);
                if let Some(owner) = state.paths.get(rel) {
                    if owner.store != store.id {
                        tracing::warn!(path = %rel, owner = %owner.store, "skipping path owned by another store");
                        result.foreign.push(rel.clone());
                        continue;
                    }
                }
                if !fsops::entry_exists(&src) {
                    result.missing.push(rel.clone());
                    continue;
                }
                if links_to(&src, &dst) {
                    result.linked.push(rel.clone());
                    continue;
                }
                fsops::remove_path(&dst)?;
                fsops::copy_tree(&src, &dst)?;
                let checksum = if dst.is_file() {
                    Some(fsops::sha256_file(&dst)?)
                } else {
                    None
                };
                state.paths.insert(
                    rel.clone(),
                    PathOwnership {
                        store: store.id.clone(),
                        scope: Some(store.scope),
                        kind: Mode::Copy,
                        timestamp: now_epoch_z(),
                        checksum,
                    },
                );
                result.captured.push(rel.clone());
            }
            if full {
                let declared: Vec<String> = manifest.paths().map(str::to_string).collect();
                result.pruned = prune_overlay(&overlay_root, &declared)?;
            }

            let mut meta = catalog.load_meta(&store.id)?;
            meta.touch();
            catalog.save_meta(&store.id, &meta)?;
            engine.states.save(&mut state)?;
            tracing::info!(
                store = %store,
                captured = result.captured.len(),
                pruned = result.pruned.len(),
                "committed workspace content"
            );
            Ok(result)
        })
}

/// `src` is a symlink resolving to the same file as `dst`.
fn links_to(src: &Path, dst: &Path) -> bool {
    if !fsops::is_symlink(src) {
        return false;
    }
    match (std::fs::canonicalize(src), std::fs::canonicalize(dst)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Remove overlay entries not covered by, and not an ancestor of, a declared path.
/// Walks top-down so an undeclared directory is removed whole.
pub fn prune_overlay(overlay_root: &Path, declared: &[String]) -> Result<Vec<String>, TesseraError> {
    let mut pruned = Vec::new();
    if !overlay_root.is_dir() {
        return Ok(pruned);
    }
    let mut walker = WalkDir::new(overlay_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(overlay_root)
            .map_err(io::Error::other)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let is_dir = entry.file_type().is_dir();
        if declared.iter().any(|d| is_covered_by(&rel, d)) {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }
        if declared.iter().any(|d| is_ancestor_of(&rel, d)) {
            continue;
        }
        fsops::remove_path(entry.path())?;
        if is_dir {
            walker.skip_current_dir();
        }
        pruned.push(rel);
    }
    Ok(pruned)
}
