//! Per-call engine context: repository discovery, configuration, catalogs,
//! workspace identity, and persistence handles.

use crate::core::config::{self, Config};
use crate::core::error::TesseraError;
use crate::core::fsops;
use crate::core::journal::Journal;
use crate::core::paths::{normalize_lexical, resolve_under, validate_rel_path};
use crate::core::repo::{self, RepoContext};
use crate::core::store::{Mode, Scope, StoreRef};
use crate::engine::catalog::{Catalog, Catalogs, DirCatalog};
use crate::engine::plan::{PlanEntry, PlanStore};
use crate::engine::scope::ScopeResolver;
use crate::engine::state::{StateStore, WorkspaceState, workspace_id};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Working directory every request is anchored to.
    pub cwd: PathBuf,
    /// Overrides `$TESSERA_HOME` / `$HOME/.tessera`.
    pub home: Option<PathBuf>,
    /// Workspace directory (absolute or cwd-relative); defaults to the repository root.
    pub workspace: Option<PathBuf>,
}

pub struct Engine {
    pub repo: RepoContext,
    pub cwd: PathBuf,
    pub home: PathBuf,
    pub config: Config,
    pub catalogs: Catalogs,
    pub states: StateStore,
    pub journal: Journal,
    /// Repository-relative workspace sub-path, `.` for the root.
    pub sub_path: String,
    pub workspace_root: PathBuf,
    pub workspace_id: String,
}

impl Engine {
    pub fn open(options: EngineOptions) -> Result<Self, TesseraError> {
        let cwd = std::fs::canonicalize(&options.cwd)?;
        let repo = repo::discover(&cwd)?;
        let home = config::resolve_home(options.home.as_deref())?;
        let config = config::load_config(&home)?.with_env_overrides()?;

        let sub_path = match &options.workspace {
            None => ".".to_string(),
            Some(ws) if normalize_lexical(&cwd.join(ws)) == repo.root => ".".to_string(),
            Some(ws) => resolve_under(&repo.root, &cwd, &ws.to_string_lossy())?,
        };
        let workspace_root = if sub_path == "." {
            repo.root.clone()
        } else {
            repo.root.join(&sub_path)
        };

        let component_root = repo.root.join(&config.component_dir);
        let catalogs = Catalogs {
            global: DirCatalog::new(Scope::Global, home.join("stores")),
            component: component_root
                .is_dir()
                .then(|| DirCatalog::new(Scope::Component, component_root.join("stores"))),
        };

        tracing::debug!(
            repo = %repo.root.display(),
            workspace = %sub_path,
            home = %home.display(),
            "engine opened"
        );
        Ok(Self {
            workspace_id: workspace_id(&repo.fingerprint, &sub_path),
            states: StateStore::new(home.join("workspaces")),
            journal: Journal::new(&home),
            repo,
            cwd,
            home,
            config,
            catalogs,
            sub_path,
            workspace_root,
        })
    }

    pub fn resolver(&self) -> ScopeResolver<'_> {
        ScopeResolver::new(&self.catalogs)
    }

    pub fn resolve_store(
        &self,
        id: &str,
        hint: Option<Scope>,
    ) -> Result<(StoreRef, &DirCatalog), TesseraError> {
        self.resolver().resolve(id, hint)
    }

    pub fn load_state(&self) -> Result<Option<WorkspaceState>, TesseraError> {
        self.states.load(&self.workspace_id)
    }

    /// Existing record or a fresh unapplied one (not yet persisted).
    pub fn state_or_new(&self) -> Result<WorkspaceState, TesseraError> {
        Ok(self.load_state()?.unwrap_or_else(|| {
            WorkspaceState::new(
                &self.workspace_id,
                &self.repo.root,
                &self.sub_path,
                self.config.default_mode,
            )
        }))
    }

    pub fn require_state(&self) -> Result<WorkspaceState, TesseraError> {
        self.load_state()?
            .ok_or_else(|| TesseraError::StateMissing(self.workspace_root.display().to_string()))
    }

    /// Store explicitly named by the request, else the workspace's active store.
    pub fn target_store(
        &self,
        state: Option<&WorkspaceState>,
        id: Option<&str>,
        hint: Option<Scope>,
    ) -> Result<(StoreRef, &DirCatalog), TesseraError> {
        match id {
            Some(id) => self.resolve_store(id, hint.or_else(|| state.and_then(|s| s.scope_hint(id)))),
            None => {
                let state = state.ok_or(TesseraError::NoActiveStore)?;
                let active = state
                    .active_store
                    .as_deref()
                    .ok_or(TesseraError::NoActiveStore)?;
                self.resolve_store(active, hint.or(state.active_store_scope))
            }
        }
    }

    /// Resolve caller paths against the working directory, to keys relative
    /// to the workspace root. Paths outside the workspace are rejected.
    pub fn resolve_paths(&self, inputs: &[String]) -> Result<Vec<String>, TesseraError> {
        inputs
            .iter()
            .map(|p| resolve_under(&self.workspace_root, &self.cwd, p))
            .collect()
    }

    /// Mode for a request: explicit, else the applied mode, else the default.
    pub fn effective_mode(&self, state: &WorkspaceState, requested: Option<Mode>) -> Mode {
        requested.unwrap_or(if state.applied {
            state.mode
        } else {
            self.config.default_mode
        })
    }

    pub fn workspace_path(&self, rel: &str) -> PathBuf {
        self.workspace_root.join(rel)
    }
}

/// Snapshot a store's manifest for planning.
pub fn plan_store(catalog: &dyn Catalog, id: &str) -> Result<PlanStore, TesseraError> {
    let manifest = catalog.load_track(id)?;
    let overlay_root = catalog.overlay_root(id);
    let entries = manifest
        .tracked
        .iter()
        .map(|t| {
            let path = validate_rel_path(&t.path)?;
            Ok(PlanEntry {
                present: fsops::entry_exists(&overlay_root.join(&path)),
                path,
            })
        })
        .collect::<Result<Vec<_>, TesseraError>>()?;
    Ok(PlanStore {
        id: id.to_string(),
        overlay_root,
        entries,
    })
}

/// Claimed paths that already exist under `workspace_root`.
pub fn occupied_paths(
    workspace_root: &Path,
    stores: &[PlanStore],
) -> std::collections::BTreeSet<String> {
    stores
        .iter()
        .flat_map(|s| s.entries.iter())
        .filter(|e| fsops::entry_exists(&workspace_root.join(&e.path)))
        .map(|e| e.path.clone())
        .collect()
}
