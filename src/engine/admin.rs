//! Store and workspace administration.

use crate::core::error::TesseraError;
use crate::core::store::{Scope, StoreMeta, StoreRef, StoreSource, TrackedPath};
use crate::engine::catalog::{Catalog, validate_store_id};
use crate::engine::context::Engine;
use crate::engine::state::{PathOwnership, WorkspaceState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CreateStoreRequest {
    pub id: String,
    /// Defaults to component when the repository has a component catalog.
    pub scope: Option<Scope>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: Option<StoreSource>,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub task_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// Partial metadata update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StorePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: Option<StoreSource>,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub task_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

impl StorePatch {
    fn apply_to(self, meta: &mut StoreMeta) -> bool {
        let mut changed = false;
        let mut set = |slot: &mut Option<String>, value: Option<String>| {
            if let Some(v) = value {
                *slot = Some(v);
                changed = true;
            }
        };
        set(&mut meta.description, self.description);
        set(&mut meta.category, self.category);
        set(&mut meta.owner, self.owner);
        set(&mut meta.task_id, self.task_id);
        set(&mut meta.parent_task_id, self.parent_task_id);
        set(&mut meta.priority, self.priority);
        set(&mut meta.status, self.status);
        if let Some(name) = self.name {
            meta.name = name;
            changed = true;
        }
        if let Some(source) = self.source {
            meta.source = source;
            changed = true;
        }
        changed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub id: String,
    pub scope: Scope,
    pub meta: StoreMeta,
    pub tracked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreDescription {
    pub store: StoreRef,
    pub meta: StoreMeta,
    pub tracked: Vec<TrackedPath>,
    pub overlay_root: String,
    /// Workspace IDs that reference this store (active, stacked, or owning paths).
    pub workspaces: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteStoreResult {
    pub store: StoreRef,
    pub workspaces_updated: Vec<String>,
    pub ledger_entries_dropped: usize,
}

pub fn create_store(engine: &Engine, req: CreateStoreRequest) -> Result<StoreMeta, TesseraError> {
    validate_store_id(&req.id)?;
    let scope = req.scope.unwrap_or_else(|| engine.resolver().default_scope());
    let catalog = engine.catalogs.require(scope)?;
    let mut meta = StoreMeta::new(req.name.as_deref().unwrap_or(&req.id), scope);
    StorePatch {
        name: None,
        description: req.description,
        source: req.source,
        category: req.category,
        owner: req.owner,
        task_id: req.task_id,
        parent_task_id: req.parent_task_id,
        priority: req.priority,
        status: req.status,
    }
    .apply_to(&mut meta);

    engine.journal.scoped("store.create", None, Some(&req.id), || {
        catalog.create(&req.id, &meta)?;
        tracing::info!(store = %req.id, scope = %scope, "created store");
        Ok(meta.clone())
    })
}

pub fn update_store(
    engine: &Engine,
    id: &str,
    scope: Option<Scope>,
    patch: StorePatch,
) -> Result<StoreMeta, TesseraError> {
    let (store, catalog) = engine.resolve_store(id, scope)?;
    engine.journal.scoped("store.update", None, Some(&store.id), || {
        let mut meta = catalog.load_meta(&store.id)?;
        if patch.apply_to(&mut meta) {
            meta.touch();
            catalog.save_meta(&store.id, &meta)?;
            tracing::info!(store = %store, "updated store metadata");
        }
        Ok(meta)
    })
}

/// Stores across visible catalogs, sorted by (scope, id).
pub fn list_stores(
    engine: &Engine,
    scope: Option<Scope>,
    status: Option<&str>,
) -> Result<Vec<StoreSummary>, TesseraError> {
    let mut out = Vec::new();
    for catalog in engine.catalogs.all() {
        if scope.is_some_and(|s| s != catalog.scope()) {
            continue;
        }
        for id in catalog.list()? {
            let meta = catalog.load_meta(&id)?;
            if status.is_some_and(|want| meta.status.as_deref() != Some(want)) {
                continue;
            }
            let tracked = catalog.load_track(&id)?.tracked.len();
            out.push(StoreSummary {
                id,
                scope: catalog.scope(),
                meta,
                tracked,
            });
        }
    }
    out.sort_by(|a, b| (a.scope, &a.id).cmp(&(b.scope, &b.id)));
    Ok(out)
}

pub fn describe_store(
    engine: &Engine,
    id: &str,
    scope: Option<Scope>,
) -> Result<StoreDescription, TesseraError> {
    let (store, catalog) = engine.resolve_store(id, scope)?;
    let meta = catalog.load_meta(&store.id)?;
    let tracked = catalog.load_track(&store.id)?.tracked;
    let workspaces = engine
        .states
        .list()?
        .into_iter()
        .filter(|s| references(s, &store, &engine.repo.root))
        .map(|s| s.workspace_id)
        .collect();
    Ok(StoreDescription {
        overlay_root: catalog.overlay_root(&store.id).display().to_string(),
        store,
        meta,
        tracked,
        workspaces,
    })
}

/// Delete a store and scrub every workspace record that references it.
/// Files it materialized stay on disk.
pub fn delete_store(
    engine: &Engine,
    id: &str,
    scope: Option<Scope>,
) -> Result<DeleteStoreResult, TesseraError> {
    let (store, catalog) = engine.resolve_store(id, scope)?;
    engine.journal.scoped("store.delete", None, Some(&store.id), || {
        let mut result = DeleteStoreResult {
            store: store.clone(),
            workspaces_updated: Vec::new(),
            ledger_entries_dropped: 0,
        };
        for mut state in engine.states.list()? {
            if !references(&state, &store, &engine.repo.root) {
                continue;
            }
            if names_active(&state, &store) {
                state.clear_active();
            }
            if names_stacked(&state, &store) {
                state.remove_from_stack(&store.id);
            }
            let before = state.paths.len();
            let kept: BTreeMap<String, PathOwnership> = state
                .paths
                .iter()
                .filter(|(_, o)| !state.owned_as(o, &store))
                .map(|(p, o)| (p.clone(), o.clone()))
                .collect();
            state.paths = kept;
            result.ledger_entries_dropped += before - state.paths.len();
            if state.paths.is_empty() {
                state.applied = false;
            }
            engine.states.save(&mut state)?;
            result.workspaces_updated.push(state.workspace_id.clone());
        }
        catalog.delete(&store.id)?;
        tracing::info!(
            store = %store,
            workspaces = result.workspaces_updated.len(),
            dropped = result.ledger_entries_dropped,
            "deleted store"
        );
        Ok(result)
    })
}

/// Whether `state` points at `store`. Component stores are only visible from
/// workspaces of the repository whose catalog holds them.
/// Ledger entries match on their recorded scope, so a same-named store in
/// the other catalog is never mistaken for this one.
fn references(state: &WorkspaceState, store: &StoreRef, repo_root: &Path) -> bool {
    if store.scope == Scope::Component && state.repo_root != repo_root {
        return false;
    }
    names_active(state, store)
        || names_stacked(state, store)
        || state.paths.values().any(|o| state.owned_as(o, store))
}

fn names_active(state: &WorkspaceState, store: &StoreRef) -> bool {
    state.active_store.as_deref() == Some(store.id.as_str())
        && state.active_store_scope.is_none_or(|s| s == store.scope)
}

fn names_stacked(state: &WorkspaceState, store: &StoreRef) -> bool {
    state.in_stack(&store.id)
        && state
            .stack_scopes
            .get(&store.id)
            .is_none_or(|s| *s == store.scope)
}

/// Select the active store without materializing it.
pub fn use_store(
    engine: &Engine,
    id: &str,
    scope: Option<Scope>,
    force: bool,
) -> Result<WorkspaceState, TesseraError> {
    let (store, _) = engine.resolve_store(id, scope)?;
    let mut state = engine.state_or_new()?;
    if state.in_stack(&store.id) {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' is on this workspace's stack",
            store.id
        )));
    }
    let switching = state
        .active_store
        .as_deref()
        .is_some_and(|active| active != store.id);
    if switching && state.applied && !force {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' is applied; unapply it or pass --force",
            state.active_store.as_deref().unwrap_or_default()
        )));
    }
    engine.journal.scoped("use", Some(&engine.workspace_id), Some(&store.id), || {
        state.active_store = Some(store.id.clone());
        state.active_store_scope = Some(store.scope);
        engine.states.save(&mut state)?;
        tracing::info!(store = %store, workspace = %engine.workspace_id, "selected active store");
        Ok(state.clone())
    })
}

pub fn list_workspaces(engine: &Engine) -> Result<Vec<WorkspaceState>, TesseraError> {
    let mut states = engine.states.list()?;
    states.sort_by(|a, b| {
        (&a.repo_root, &a.sub_path).cmp(&(&b.repo_root, &b.sub_path))
    });
    Ok(states)
}

/// Defaults to the current workspace.
pub fn describe_workspace(
    engine: &Engine,
    id: Option<&str>,
) -> Result<WorkspaceState, TesseraError> {
    let id = id.unwrap_or(&engine.workspace_id);
    engine
        .states
        .load(id)?
        .ok_or_else(|| TesseraError::StateMissing(id.to_string()))
}

/// Delete a workspace record; materialized files are left alone.
pub fn delete_workspace(engine: &Engine, id: Option<&str>) -> Result<String, TesseraError> {
    let id = id.unwrap_or(&engine.workspace_id).to_string();
    engine.journal.scoped("workspace.delete", Some(&id), None, || {
        if !engine.states.delete(&id)? {
            return Err(TesseraError::StateMissing(id.clone()));
        }
        tracing::info!(workspace = %id, "deleted workspace record");
        Ok(id.clone())
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PruneEntry {
    pub workspace_id: String,
    pub workspace_root: String,
    pub reason: &'static str,
}

/// Drop records whose directory is gone or that reference nothing.
pub fn prune(engine: &Engine, dry_run: bool) -> Result<Vec<PruneEntry>, TesseraError> {
    let stale: Vec<PruneEntry> = engine
        .states
        .list()?
        .into_iter()
        .filter_map(|s| {
            let reason = if !s.workspace_root().is_dir() {
                "workspace directory missing"
            } else if s.paths.is_empty() && s.active_store.is_none() && s.stack.is_empty() {
                "empty"
            } else {
                return None;
            };
            Some(PruneEntry {
                workspace_root: s.workspace_root().display().to_string(),
                workspace_id: s.workspace_id,
                reason,
            })
        })
        .collect();
    if dry_run || stale.is_empty() {
        return Ok(stale);
    }
    engine.journal.scoped("prune", None, None, || {
        for entry in &stale {
            engine.states.delete(&entry.workspace_id)?;
        }
        tracing::info!(pruned = stale.len(), "pruned workspace records");
        Ok(stale.clone())
    })
}
