//! Workspace state and its ownership ledger.

use crate::core::error::TesseraError;
use crate::core::fsops::sha256_bytes;
use crate::core::persist::DocStore;
use crate::core::store::{Mode, Scope, StoreRef};
use crate::core::time::now_epoch_z;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Deterministic workspace identifier for (repository fingerprint, sub-path).
pub fn workspace_id(fingerprint: &str, sub_path: &str) -> String {
    let mut material = Vec::with_capacity(fingerprint.len() + sub_path.len() + 1);
    material.extend_from_slice(fingerprint.as_bytes());
    material.push(0);
    material.extend_from_slice(sub_path.as_bytes());
    sha256_bytes(&material)[..32].to_string()
}

/// Ledger entry: which store materialized a path, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOwnership {
    pub store: String,
    /// Catalog the owning store was resolved from. Absent in records written
    /// before scopes were tracked per entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(rename = "type")]
    pub kind: Mode,
    pub timestamp: String,
    /// Content hash, recorded for copy-mode regular files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedStore {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub mode: Mode,
    pub applied_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub workspace_id: String,
    pub repo_root: PathBuf,
    pub sub_path: String,
    pub applied: bool,
    pub mode: Mode,
    #[serde(default)]
    pub active_store: Option<String>,
    #[serde(default)]
    pub active_store_scope: Option<Scope>,
    /// Auxiliary stores; later entries take precedence.
    #[serde(default)]
    pub stack: Vec<String>,
    #[serde(default)]
    pub stack_scopes: BTreeMap<String, Scope>,
    /// Ledger: workspace-relative path to owner.
    #[serde(default)]
    pub paths: BTreeMap<String, PathOwnership>,
    #[serde(default)]
    pub applied_stores: Vec<AppliedStore>,
    #[serde(default)]
    pub updated_at: String,
}

impl WorkspaceState {
    pub fn new(workspace_id: &str, repo_root: &Path, sub_path: &str, mode: Mode) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            repo_root: repo_root.to_path_buf(),
            sub_path: sub_path.to_string(),
            applied: false,
            mode,
            active_store: None,
            active_store_scope: None,
            stack: Vec::new(),
            stack_scopes: BTreeMap::new(),
            paths: BTreeMap::new(),
            applied_stores: Vec::new(),
            updated_at: now_epoch_z(),
        }
    }

    /// Directory the ledger paths are relative to.
    pub fn workspace_root(&self) -> PathBuf {
        if self.sub_path == "." {
            self.repo_root.clone()
        } else {
            self.repo_root.join(&self.sub_path)
        }
    }

    /// Ledger paths owned by `store`, sorted.
    pub fn owned_by(&self, store: &str) -> Vec<String> {
        self.paths
            .iter()
            .filter(|(_, o)| o.store == store)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn owns_any(&self, store: &str) -> bool {
        self.paths.values().any(|o| o.store == store)
    }

    pub fn in_stack(&self, store: &str) -> bool {
        self.stack.iter().any(|s| s == store)
    }

    /// Scope recorded for a store this workspace references, if any.
    pub fn scope_hint(&self, store: &str) -> Option<Scope> {
        if self.active_store.as_deref() == Some(store) {
            return self.active_store_scope;
        }
        self.stack_scopes.get(store).copied()
    }

    /// Ledger owners that are neither the active store nor on the stack.
    /// These are left over from a store switch or a forced pop.
    pub fn stale_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self
            .paths
            .values()
            .map(|o| o.store.clone())
            .filter(|id| {
                self.active_store.as_deref() != Some(id.as_str())
                    && !self.in_stack(id)
            })
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// Whether a ledger entry belongs to `store`. Entries without a recorded
    /// scope only match when the workspace still names the store in that scope.
    pub fn owned_as(&self, owner: &PathOwnership, store: &StoreRef) -> bool {
        owner.store == store.id
            && match owner.scope {
                Some(scope) => scope == store.scope,
                None => self.scope_hint(&store.id) == Some(store.scope),
            }
    }

    pub fn record_applied(&mut self, store: &str, mode: Mode, limit: usize) {
        self.applied_stores.push(AppliedStore {
            store_id: store.to_string(),
            mode,
            applied_at: now_epoch_z(),
        });
        if self.applied_stores.len() > limit {
            let excess = self.applied_stores.len() - limit;
            self.applied_stores.drain(..excess);
        }
    }

    pub fn remove_from_stack(&mut self, store: &str) -> bool {
        let before = self.stack.len();
        self.stack.retain(|s| s != store);
        self.stack_scopes.remove(store);
        self.stack.len() != before
    }

    pub fn clear_active(&mut self) {
        self.active_store = None;
        self.active_store_scope = None;
    }

    pub fn touch(&mut self) {
        self.updated_at = now_epoch_z();
    }
}

/// Persistence for workspace records, keyed by workspace ID.
#[derive(Debug, Clone)]
pub struct StateStore {
    docs: DocStore,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            docs: DocStore::new(root),
        }
    }

    pub fn load(&self, workspace_id: &str) -> Result<Option<WorkspaceState>, TesseraError> {
        self.docs.load(workspace_id)
    }

    pub fn save(&self, state: &mut WorkspaceState) -> Result<(), TesseraError> {
        state.touch();
        self.docs.save(&state.workspace_id, state)
    }

    pub fn delete(&self, workspace_id: &str) -> Result<bool, TesseraError> {
        self.docs.delete(workspace_id)
    }

    pub fn list(&self) -> Result<Vec<WorkspaceState>, TesseraError> {
        let mut out = Vec::new();
        for key in self.docs.keys()? {
            match self.docs.load::<WorkspaceState>(&key) {
                Ok(Some(state)) => out.push(state),
                Ok(None) => {}
                Err(e) => tracing::warn!(workspace = %key, error = %e, "skipping unreadable workspace record"),
            }
        }
        Ok(out)
    }
}
