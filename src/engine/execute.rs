//! Overlay execution: apply and unapply for the active store.
//!
//! Every call loads the workspace record, mutates it in memory while the
//! filesystem operations run, and persists once at the end. An operation
//! failure returns before the save, so the ledger never claims a state the
//! filesystem did not reach.

use crate::core::error::TesseraError;
use crate::core::fsops;
use crate::core::paths::removal_order;
use crate::core::store::{Mode, Scope, StoreRef};
use crate::core::time::now_epoch_z;
use crate::engine::context::{Engine, occupied_paths, plan_store};
use crate::engine::plan::{ApplyPlan, OpKind, Operation, PlanInput, plan};
use crate::engine::state::{PathOwnership, WorkspaceState};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    pub store: Option<String>,
    pub scope: Option<Scope>,
    pub mode: Option<Mode>,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub workspace_id: String,
    pub stores: Vec<StoreRef>,
    pub mode: Mode,
    pub plan: ApplyPlan,
    /// Operations actually performed (empty on dry-run).
    pub applied: Vec<Operation>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UnapplyRequest {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnapplyResult {
    pub workspace_id: String,
    pub stores: Vec<String>,
    pub removed: Vec<String>,
    /// The ledger emptied and the workspace record was deleted.
    pub state_deleted: bool,
}

/// Run planned operations in order, mirroring each success into `ledger`.
/// `stores` supplies the scope recorded for each new entry.
/// Stops at the first failure; the caller must then discard `ledger`.
pub fn execute_plan(
    plan: &ApplyPlan,
    stores: &[StoreRef],
    ledger: &mut BTreeMap<String, PathOwnership>,
) -> Result<Vec<Operation>, TesseraError> {
    let mut done = Vec::with_capacity(plan.operations.len());
    for op in &plan.operations {
        run_operation(op).map_err(|e| {
            tracing::error!(
                op = ?op.kind,
                path = %op.rel_path,
                store = %op.store,
                error = %e,
                "overlay operation failed; aborting remaining operations"
            );
            e
        })?;
        match op.kind.mode() {
            None => {
                ledger.remove(&op.rel_path);
            }
            Some(mode) => {
                let checksum = if mode == Mode::Copy && op.destination.is_file() {
                    Some(fsops::sha256_file(&op.destination)?)
                } else {
                    None
                };
                ledger.insert(
                    op.rel_path.clone(),
                    PathOwnership {
                        store: op.store.clone(),
                        scope: stores.iter().find(|s| s.id == op.store).map(|s| s.scope),
                        kind: mode,
                        timestamp: now_epoch_z(),
                        checksum,
                    },
                );
            }
        }
        tracing::debug!(op = ?op.kind, path = %op.rel_path, store = %op.store, "applied");
        done.push(op.clone());
    }
    Ok(done)
}

fn run_operation(op: &Operation) -> Result<(), TesseraError> {
    match op.kind {
        OpKind::Remove => {
            fsops::remove_path(&op.destination)?;
        }
        OpKind::CreateSymlink => {
            fsops::symlink(source_of(op)?, &op.destination)?;
        }
        OpKind::Copy => {
            fsops::copy_tree(source_of(op)?, &op.destination)?;
        }
    }
    Ok(())
}

fn source_of(op: &Operation) -> Result<&Path, TesseraError> {
    op.source.as_deref().ok_or_else(|| {
        TesseraError::ValidationError(format!("operation on '{}' has no source", op.rel_path))
    })
}

/// Reject switching the workspace's materialization mode while applied, unless forced.
pub fn check_mode_transition(
    state: &WorkspaceState,
    mode: Mode,
    force: bool,
) -> Result<(), TesseraError> {
    if state.applied && state.mode != mode && !force {
        return Err(TesseraError::ValidationError(format!(
            "workspace is applied in {} mode; unapply first or pass --force to switch to {}",
            state.mode, mode
        )));
    }
    Ok(())
}

/// Materialize the active (or named) store into the workspace.
pub fn apply(engine: &Engine, req: ApplyRequest) -> Result<ApplyResult, TesseraError> {
    let current = engine.load_state()?;
    let (store, catalog) = engine.target_store(current.as_ref(), req.store.as_deref(), req.scope)?;
    let mut state = current.unwrap_or_else(|| {
        WorkspaceState::new(
            &engine.workspace_id,
            &engine.repo.root,
            &engine.sub_path,
            engine.config.default_mode,
        )
    });
    if state.in_stack(&store.id) {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' is on this workspace's stack; pop it before applying it as the active store",
            store.id
        )));
    }
    let mode = engine.effective_mode(&state, req.mode);
    check_mode_transition(&state, mode, req.force)?;

    // Everything owned by neither this store nor the stack goes: the previous
    // active store, plus anything a switch or forced pop left behind.
    let retired: Vec<String> = state
        .paths
        .values()
        .map(|o| o.store.clone())
        .filter(|owner| *owner != store.id && !state.in_stack(owner))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let stores = vec![plan_store(catalog, &store.id)?];
    let occupied = occupied_paths(&engine.workspace_root, &stores);
    let apply_plan = plan(&PlanInput {
        ledger: &state.paths,
        stores: &stores,
        retired: &retired,
        occupied: &occupied,
        workspace_root: &engine.workspace_root,
        mode,
        force: req.force,
    });
    if apply_plan.is_blocked(req.force) {
        return Err(TesseraError::Conflict {
            paths: apply_plan.conflict_paths(),
        });
    }
    if req.dry_run {
        return Ok(ApplyResult {
            workspace_id: engine.workspace_id.clone(),
            stores: vec![store],
            mode,
            plan: apply_plan,
            applied: Vec::new(),
            dry_run: true,
        });
    }

    engine.journal.scoped("apply", Some(&engine.workspace_id), Some(&store.id), || {
        let applied = execute_plan(&apply_plan, std::slice::from_ref(&store), &mut state.paths)?;
        state.applied = true;
        state.mode = mode;
        state.active_store = Some(store.id.clone());
        state.active_store_scope = Some(store.scope);
        state.record_applied(&store.id, mode, engine.config.history_limit);
        engine.states.save(&mut state)?;
        tracing::info!(
            store = %store,
            mode = %mode,
            operations = applied.len(),
            "applied store"
        );
        Ok(ApplyResult {
            workspace_id: engine.workspace_id.clone(),
            stores: vec![store.clone()],
            mode,
            plan: apply_plan.clone(),
            applied,
            dry_run: false,
        })
    })
}

/// Remove everything the active store materialized.
pub fn unapply(engine: &Engine, req: UnapplyRequest) -> Result<UnapplyResult, TesseraError> {
    let state = engine.require_state()?;
    let active = state
        .active_store
        .clone()
        .ok_or(TesseraError::NoActiveStore)?;
    engine.journal.scoped("unapply", Some(&engine.workspace_id), Some(&active), || {
        unapply_selected(engine, state, &[active.clone()], req.force)
    })
}

/// Remove every ledger entry owned by one of `stores`, children before parents.
/// Deletes the workspace record when the ledger ends up empty.
pub fn unapply_selected(
    engine: &Engine,
    mut state: WorkspaceState,
    stores: &[String],
    force: bool,
) -> Result<UnapplyResult, TesseraError> {
    let mut candidates: Vec<String> = state
        .paths
        .iter()
        .filter(|(_, o)| stores.contains(&o.store))
        .map(|(p, _)| p.clone())
        .collect();
    let mut result = UnapplyResult {
        workspace_id: state.workspace_id.clone(),
        stores: stores.to_vec(),
        removed: Vec::new(),
        state_deleted: false,
    };
    if candidates.is_empty() {
        return Ok(result);
    }
    candidates.sort_by(|a, b| removal_order(a, b));

    let root = state.workspace_root();
    for rel in candidates {
        let dest = root.join(&rel);
        if !force {
            if let Some(owner) = state.paths.get(&rel) {
                if owner.kind == Mode::Symlink
                    && fsops::entry_exists(&dest)
                    && !fsops::is_symlink(&dest)
                {
                    tracing::warn!(
                        path = %rel,
                        store = %owner.store,
                        "expected a symlink but found a regular entry; removing anyway"
                    );
                }
            }
        }
        fsops::remove_path(&dest)?;
        state.paths.remove(&rel);
        result.removed.push(rel);
    }

    if state.paths.is_empty() {
        engine.states.delete(&state.workspace_id)?;
        result.state_deleted = true;
    } else {
        engine.states.save(&mut state)?;
    }
    tracing::info!(
        stores = ?stores,
        removed = result.removed.len(),
        state_deleted = result.state_deleted,
        "unapplied"
    );
    Ok(result)
}
