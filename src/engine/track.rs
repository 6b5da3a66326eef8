//! Track manifests: declaring which paths a store manages.
//!
//! Tracking only edits the manifest. Nothing is copied, linked, or recorded in
//! any workspace ledger until a commit or apply.

use crate::core::error::TesseraError;
use crate::core::store::{Scope, StoreRef, TrackKind, TrackedPath};
use crate::core::time::now_epoch_z;
use crate::engine::catalog::Catalog;
use crate::engine::context::Engine;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct TrackRequest {
    pub paths: Vec<String>,
    /// Defaults to the active store.
    pub store: Option<String>,
    pub scope: Option<Scope>,
    /// Inferred from disk when not given.
    pub kind: Option<TrackKind>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    pub store: StoreRef,
    /// Newly declared, canonical workspace-relative paths.
    pub added: Vec<String>,
    /// Already declared; left untouched.
    pub existing: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UntrackRequest {
    pub paths: Vec<String>,
    pub store: Option<String>,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UntrackResult {
    pub store: StoreRef,
    pub removed: Vec<String>,
    /// Inputs that matched no declared path.
    pub unmatched: Vec<String>,
}

pub fn track(engine: &Engine, req: TrackRequest) -> Result<TrackResult, TesseraError> {
    if req.paths.is_empty() {
        return Err(TesseraError::ValidationError(
            "track needs at least one path".to_string(),
        ));
    }
    let state = engine.load_state()?;
    let (store, catalog) = engine.target_store(state.as_ref(), req.store.as_deref(), req.scope)?;
    let resolved = engine.resolve_paths(&req.paths)?;

    let mut manifest = catalog.load_track(&store.id)?;
    let mut added = Vec::new();
    let mut existing = Vec::new();
    let now = now_epoch_z();
    for rel in resolved {
        if manifest.contains(&rel) || added.contains(&rel) {
            existing.push(rel);
            continue;
        }
        let kind = req.kind.unwrap_or_else(|| {
            if engine.workspace_path(&rel).is_dir() {
                TrackKind::Directory
            } else {
                TrackKind::File
            }
        });
        manifest.insert(TrackedPath {
            path: rel.clone(),
            kind,
            role: req.role.clone(),
            description: req.description.clone(),
            origin: req.origin.clone(),
            created_at: now.clone(),
            updated_at: now.clone(),
        });
        added.push(rel);
    }

    if !added.is_empty() {
        engine
            .journal
            .scoped("track", Some(&engine.workspace_id), Some(&store.id), || {
                catalog.save_track(&store.id, &manifest)?;
                let mut meta = catalog.load_meta(&store.id)?;
                meta.touch();
                catalog.save_meta(&store.id, &meta)
            })?;
        tracing::info!(store = %store, added = added.len(), "tracked paths");
    }
    Ok(TrackResult {
        store,
        added,
        existing,
    })
}

pub fn untrack(engine: &Engine, req: UntrackRequest) -> Result<UntrackResult, TesseraError> {
    let state = engine.load_state()?;
    let (store, catalog) = engine.target_store(state.as_ref(), req.store.as_deref(), req.scope)?;
    let mut manifest = catalog.load_track(&store.id)?;
    let mut removed = Vec::new();
    let mut unmatched = Vec::new();
    for (input, rel) in req.paths.iter().zip(engine.resolve_paths(&req.paths)?) {
        if manifest.remove(&rel) {
            removed.push(rel);
        } else {
            unmatched.push(input.clone());
        }
    }
    if !removed.is_empty() {
        engine
            .journal
            .scoped("untrack", Some(&engine.workspace_id), Some(&store.id), || {
                catalog.save_track(&store.id, &manifest)?;
                let mut meta = catalog.load_meta(&store.id)?;
                meta.touch();
                catalog.save_meta(&store.id, &meta)
            })?;
        tracing::info!(store = %store, removed = removed.len(), "untracked paths");
    }
    Ok(UntrackResult {
        store,
        removed,
        unmatched,
    })
}
