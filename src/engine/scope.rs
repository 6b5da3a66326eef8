//! Store-ID to catalog resolution across scopes.

use crate::core::error::TesseraError;
use crate::core::store::{Scope, StoreRef};
use crate::engine::catalog::{Catalog, Catalogs, DirCatalog};
use std::collections::BTreeMap;

pub struct ScopeResolver<'a> {
    catalogs: &'a Catalogs,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(catalogs: &'a Catalogs) -> Self {
        Self { catalogs }
    }

    /// Every catalog holding `id`. Global and component are independent
    /// namespaces, so both may match.
    pub fn find(&self, id: &str) -> Vec<(Scope, &'a DirCatalog)> {
        self.catalogs
            .all()
            .into_iter()
            .filter(|c| c.exists(id))
            .map(|c| (c.scope(), c))
            .collect()
    }

    /// With a hint, look only in that catalog; without one, exactly one match is required.
    pub fn resolve(
        &self,
        id: &str,
        hint: Option<Scope>,
    ) -> Result<(StoreRef, &'a DirCatalog), TesseraError> {
        if let Some(scope) = hint {
            let catalog = self.catalogs.require(scope)?;
            if !catalog.exists(id) {
                return Err(TesseraError::NotFound(format!(
                    "store '{}' in {} scope",
                    id, scope
                )));
            }
            return Ok((store_ref(id, scope), catalog));
        }
        let mut matches = self.find(id);
        match matches.len() {
            0 => Err(TesseraError::NotFound(format!("store '{}'", id))),
            1 => {
                let (scope, catalog) = matches.remove(0);
                Ok((store_ref(id, scope), catalog))
            }
            _ => Err(TesseraError::Ambiguous(format!(
                "store '{}' exists in both global and component scopes; pass --scope",
                id
            ))),
        }
    }

    /// Scope for a new store when the caller gives none.
    pub fn default_scope(&self) -> Scope {
        if self.catalogs.component.is_some() {
            Scope::Component
        } else {
            Scope::Global
        }
    }
}

fn store_ref(id: &str, scope: Scope) -> StoreRef {
    StoreRef {
        id: id.to_string(),
        scope,
    }
}

/// Routes store IDs to catalogs from a table resolved once up front.
pub struct StoreRouter<'a> {
    catalogs: &'a Catalogs,
    routes: BTreeMap<String, Scope>,
}

impl<'a> StoreRouter<'a> {
    /// Resolve each `(id, hint)` pair once. Fails on the first unknown or ambiguous ID.
    pub fn build(
        catalogs: &'a Catalogs,
        entries: &[(String, Option<Scope>)],
    ) -> Result<Self, TesseraError> {
        let resolver = ScopeResolver::new(catalogs);
        let mut routes = BTreeMap::new();
        for (id, hint) in entries {
            let (resolved, _) = resolver.resolve(id, *hint)?;
            routes.insert(resolved.id, resolved.scope);
        }
        Ok(Self { catalogs, routes })
    }

    pub fn scope_of(&self, id: &str) -> Option<Scope> {
        self.routes.get(id).copied()
    }

    pub fn route(&self, id: &str) -> Result<&'a DirCatalog, TesseraError> {
        let scope = self
            .scope_of(id)
            .ok_or_else(|| TesseraError::NotFound(format!("store '{}' is not routed", id)))?;
        self.catalogs.require(scope)
    }
}
