//! Auxiliary store stack.
//!
//! The stack is an ordered list of stores applied alongside the active store;
//! a later entry beats an earlier one when both declare the same path.

use crate::core::error::TesseraError;
use crate::core::store::{Mode, Scope, StoreRef};
use crate::engine::context::{Engine, occupied_paths, plan_store};
use crate::engine::execute::{
    ApplyResult, UnapplyResult, check_mode_transition, execute_plan, unapply_selected,
};
use crate::engine::plan::{PlanInput, plan};
use crate::engine::scope::StoreRouter;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StackEntry {
    pub position: usize,
    pub store: StoreRef,
    /// Ledger paths this store currently owns.
    pub owned_paths: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StackApplyRequest {
    pub mode: Option<Mode>,
    pub force: bool,
    pub dry_run: bool,
}

pub fn stack_list(engine: &Engine) -> Result<Vec<StackEntry>, TesseraError> {
    let Some(state) = engine.load_state()? else {
        return Ok(Vec::new());
    };
    Ok(state
        .stack
        .iter()
        .enumerate()
        .map(|(position, id)| StackEntry {
            position,
            store: StoreRef {
                id: id.clone(),
                scope: state
                    .stack_scopes
                    .get(id)
                    .copied()
                    .unwrap_or(Scope::Global),
            },
            owned_paths: state.owned_by(id).len(),
        })
        .collect())
}

/// Push a store onto the top of the stack (highest precedence).
pub fn stack_add(
    engine: &Engine,
    id: &str,
    scope: Option<Scope>,
) -> Result<Vec<StackEntry>, TesseraError> {
    let (store, _) = engine.resolve_store(id, scope)?;
    let mut state = engine.state_or_new()?;
    if state.in_stack(&store.id) {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' is already on the stack",
            store.id
        )));
    }
    if state.active_store.as_deref() == Some(store.id.as_str()) {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' is the active store and cannot also be stacked",
            store.id
        )));
    }
    engine
        .journal
        .scoped("stack.add", Some(&engine.workspace_id), Some(&store.id), || {
            state.stack.push(store.id.clone());
            state.stack_scopes.insert(store.id.clone(), store.scope);
            engine.states.save(&mut state)
        })?;
    tracing::info!(store = %store, depth = state.stack.len(), "stacked store");
    stack_list(engine)
}

/// Remove the top entry. A store that still owns materialized paths stays
/// unless forced; the next apply or stack apply then removes its paths.
pub fn stack_pop(engine: &Engine, force: bool) -> Result<Option<String>, TesseraError> {
    let Some(mut state) = engine.load_state()? else {
        return Ok(None);
    };
    let Some(top) = state.stack.last().cloned() else {
        return Ok(None);
    };
    if state.owns_any(&top) && !force {
        return Err(TesseraError::ValidationError(format!(
            "store '{}' still owns applied paths; run `stack unapply` first or pass --force",
            top
        )));
    }
    engine
        .journal
        .scoped("stack.pop", Some(&engine.workspace_id), Some(&top), || {
            state.remove_from_stack(&top);
            engine.states.save(&mut state)
        })?;
    Ok(Some(top))
}

pub fn stack_clear(engine: &Engine, force: bool) -> Result<Vec<String>, TesseraError> {
    let Some(mut state) = engine.load_state()? else {
        return Ok(Vec::new());
    };
    if !force {
        if let Some(owner) = state.stack.iter().find(|s| state.owns_any(s)) {
            return Err(TesseraError::ValidationError(format!(
                "stacked store '{}' still owns applied paths; run `stack unapply` first or pass --force",
                owner
            )));
        }
    }
    let cleared = std::mem::take(&mut state.stack);
    state.stack_scopes.clear();
    engine
        .journal
        .scoped("stack.clear", Some(&engine.workspace_id), None, || {
            engine.states.save(&mut state)
        })?;
    Ok(cleared)
}

/// Plan and materialize every stacked store, in stack order.
pub fn stack_apply(engine: &Engine, req: StackApplyRequest) -> Result<ApplyResult, TesseraError> {
    let mut state = engine.state_or_new()?;
    if state.stack.is_empty() {
        return Err(TesseraError::ValidationError(
            "the stack is empty; add stores with `stack add`".to_string(),
        ));
    }
    let mode = engine.effective_mode(&state, req.mode);
    check_mode_transition(&state, mode, req.force)?;

    let entries: Vec<(String, Option<Scope>)> = state
        .stack
        .iter()
        .map(|id| (id.clone(), state.stack_scopes.get(id).copied()))
        .collect();
    let router = StoreRouter::build(&engine.catalogs, &entries)?;
    let mut stores = Vec::with_capacity(state.stack.len());
    let mut refs = Vec::with_capacity(state.stack.len());
    for id in &state.stack {
        stores.push(plan_store(router.route(id)?, id)?);
        refs.push(StoreRef {
            id: id.clone(),
            scope: router.scope_of(id).unwrap_or(Scope::Global),
        });
    }
    let retired = state.stale_owners();
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
            stores: refs,
            mode,
            plan: apply_plan,
            applied: Vec::new(),
            dry_run: true,
        });
    }

    engine
        .journal
        .scoped("stack.apply", Some(&engine.workspace_id), None, || {
            let applied = execute_plan(&apply_plan, &refs, &mut state.paths)?;
            state.applied = true;
            state.mode = mode;
            for store in &refs {
                state.record_applied(&store.id, mode, engine.config.history_limit);
            }
            engine.states.save(&mut state)?;
            tracing::info!(
                stores = refs.len(),
                mode = %mode,
                operations = applied.len(),
                "applied stack"
            );
            Ok(ApplyResult {
                workspace_id: engine.workspace_id.clone(),
                stores: refs.clone(),
                mode,
                plan: apply_plan.clone(),
                applied,
                dry_run: false,
            })
        })
}

/// Remove every path owned by any stacked store. The active store's paths stay.
pub fn stack_unapply(engine: &Engine, force: bool) -> Result<UnapplyResult, TesseraError> {
    let state = engine.require_state()?;
    let members = state.stack.clone();
    engine
        .journal
        .scoped("stack.unapply", Some(&engine.workspace_id), None, || {
            unapply_selected(engine, state, &members, force)
        })
}
