//! Apply planning.
//!
//! [`plan`] is a pure function of a ledger snapshot, an ordered list of
//! stores, and the set of workspace paths already present on disk. It never
//! touches the filesystem, so everything here can be tested exhaustively.
//!
//! Rules, for stores in list order (later stores take precedence):
//!
//! * two stores claiming the same or nested paths is a `Contested` conflict;
//!   the later claim wins;
//! * a claim overlapping a ledger entry owned by a store outside the plan is
//!   an `OwnedElsewhere` conflict; forcing removes the old entry first;
//! * a claim landing on an existing path the ledger knows nothing about is an
//!   `Unmanaged` conflict; forcing removes the path first;
//! * ledger paths owned by a planned store that it no longer claims, and every
//!   path owned by a retired store, are removed;
//! * a claim already owned by the same store in the same mode is a no-op
//!   unless forced.
//!
//! Removals come first, deepest path first, then creations in claim order.

use crate::core::paths::{is_ancestor_of, is_covered_by, removal_order};
use crate::core::store::Mode;
use crate::engine::state::PathOwnership;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    CreateSymlink,
    Copy,
    Remove,
}

impl OpKind {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Symlink => OpKind::CreateSymlink,
            Mode::Copy => OpKind::Copy,
        }
    }

    /// Materialization type recorded in the ledger, `None` for removals.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            OpKind::CreateSymlink => Some(Mode::Symlink),
            OpKind::Copy => Some(Mode::Copy),
            OpKind::Remove => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OpKind,
    /// Incoming owner for creations; previous owner for removals.
    pub store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub destination: PathBuf,
    pub rel_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Two stores in the plan claim the same or nested paths.
    Contested,
    /// The ledger assigns the path to a store outside the plan.
    OwnedElsewhere,
    /// The path exists in the workspace but is not in the ledger.
    Unmanaged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub kind: ConflictKind,
    /// Competing stores, earlier precedence first.
    pub stores: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPlan {
    pub operations: Vec<Operation>,
    pub conflicts: Vec<Conflict>,
    /// Declared paths with no content in their store's overlay yet.
    pub skipped: Vec<String>,
}

impl ApplyPlan {
    pub fn is_blocked(&self, force: bool) -> bool {
        !force && !self.conflicts.is_empty()
    }

    pub fn conflict_paths(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.path.clone()).collect()
    }

    pub fn count(&self, kind: OpKind) -> usize {
        self.operations.iter().filter(|o| o.kind == kind).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub path: String,
    /// Whether the overlay holds content for this path.
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStore {
    pub id: String,
    pub overlay_root: PathBuf,
    pub entries: Vec<PlanEntry>,
}

pub struct PlanInput<'a> {
    pub ledger: &'a BTreeMap<String, PathOwnership>,
    pub stores: &'a [PlanStore],
    pub retired: &'a [String],
    /// Claimed workspace paths that currently exist on disk.
    pub occupied: &'a BTreeSet<String>,
    pub workspace_root: &'a Path,
    pub mode: Mode,
    pub force: bool,
}

#[derive(Debug, Clone)]
struct Claim {
    path: String,
    store: usize,
}

pub fn plan(input: &PlanInput<'_>) -> ApplyPlan {
    let mut out = ApplyPlan::default();
    let mut conflicts: BTreeMap<String, Conflict> = BTreeMap::new();
    let planned: BTreeSet<&str> = input.stores.iter().map(|s| s.id.as_str()).collect();
    let retired: BTreeSet<&str> = input
        .retired
        .iter()
        .map(String::as_str)
        .filter(|r| !planned.contains(r))
        .collect();

    // Resolve claims: nested entries inside one store collapse into the
    // outermost, overlapping claims across stores go to the later store.
    let mut winners: Vec<Claim> = Vec::new();
    for (idx, store) in input.stores.iter().enumerate() {
        for entry in &store.entries {
            let nested_in_own = store
                .entries
                .iter()
                .any(|other| is_ancestor_of(&other.path, &entry.path));
            if nested_in_own {
                continue;
            }
            if !entry.present {
                out.skipped.push(format!("{}:{}", store.id, entry.path));
                continue;
            }
            winners.retain(|w| {
                if w.store == idx || !overlaps(&w.path, &entry.path) {
                    return true;
                }
                let deeper = if w.path.len() >= entry.path.len() {
                    &w.path
                } else {
                    &entry.path
                };
                add_conflict(
                    &mut conflicts,
                    deeper,
                    ConflictKind::Contested,
                    &[input.stores[w.store].id.as_str(), store.id.as_str()],
                );
                false
            });
            winners.push(Claim {
                path: entry.path.clone(),
                store: idx,
            });
        }
    }
    let winning: BTreeSet<(&str, &str)> = winners
        .iter()
        .map(|w| (input.stores[w.store].id.as_str(), w.path.as_str()))
        .collect();

    let mut removals: BTreeMap<String, String> = BTreeMap::new();
    for (path, owner) in input.ledger {
        let store = owner.store.as_str();
        let reconcile = planned.contains(store) && !winning.contains(&(store, path.as_str()));
        if reconcile || retired.contains(store) {
            removals.insert(path.clone(), owner.store.clone());
        }
    }

    let mut creations: Vec<&Claim> = Vec::new();
    let mut satisfied: Vec<&Claim> = Vec::new();
    for claim in &winners {
        let store_id = input.stores[claim.store].id.as_str();
        let mut blocked = false;
        let mut covered_by_ledger = false;
        let mut up_to_date = false;

        for (path, owner) in input.ledger {
            if !overlaps(path, &claim.path) {
                continue;
            }
            if path == &claim.path || is_ancestor_of(path, &claim.path) {
                covered_by_ledger = true;
            }
            let owner_id = owner.store.as_str();
            if owner_id == store_id {
                if path == &claim.path {
                    if owner.kind == input.mode && !input.force {
                        up_to_date = true;
                    } else {
                        removals.insert(path.clone(), owner.store.clone());
                    }
                }
                continue;
            }
            if planned.contains(owner_id) || retired.contains(owner_id) {
                continue;
            }
            add_conflict(
                &mut conflicts,
                &claim.path,
                ConflictKind::OwnedElsewhere,
                &[owner_id, store_id],
            );
            if input.force {
                removals.insert(path.clone(), owner.store.clone());
            } else {
                blocked = true;
            }
        }

        if !covered_by_ledger && input.occupied.contains(&claim.path) {
            add_conflict(
                &mut conflicts,
                &claim.path,
                ConflictKind::Unmanaged,
                &[store_id],
            );
            if input.force {
                removals.insert(claim.path.clone(), store_id.to_string());
            } else {
                blocked = true;
            }
        }

        if blocked {
            continue;
        }
        if up_to_date {
            satisfied.push(claim);
        } else {
            creations.push(claim);
        }
    }

    // A no-op claim still needs recreating if something above it is removed.
    for claim in satisfied {
        if removals.keys().any(|r| is_covered_by(&claim.path, r)) {
            creations.push(claim);
        }
    }
    creations.sort_by_key(|c| {
        winners
            .iter()
            .position(|w| w.path == c.path && w.store == c.store)
    });

    let mut removal_paths: Vec<(String, String)> = removals.into_iter().collect();
    removal_paths.sort_by(|a, b| removal_order(&a.0, &b.0));
    for (path, store) in removal_paths {
        out.operations.push(Operation {
            kind: OpKind::Remove,
            store,
            source: None,
            destination: input.workspace_root.join(&path),
            rel_path: path,
        });
    }
    for claim in creations {
        let store = &input.stores[claim.store];
        out.operations.push(Operation {
            kind: OpKind::for_mode(input.mode),
            store: store.id.clone(),
            source: Some(store.overlay_root.join(&claim.path)),
            destination: input.workspace_root.join(&claim.path),
            rel_path: claim.path.clone(),
        });
    }
    out.conflicts = conflicts.into_values().collect();
    out
}

fn overlaps(a: &str, b: &str) -> bool {
    is_covered_by(a, b) || is_covered_by(b, a)
}

fn add_conflict(
    conflicts: &mut BTreeMap<String, Conflict>,
    path: &str,
    kind: ConflictKind,
    stores: &[&str],
) {
    let entry = conflicts.entry(path.to_string()).or_insert_with(|| Conflict {
        path: path.to_string(),
        kind,
        stores: Vec::new(),
    });
    for store in stores {
        if !entry.stores.iter().any(|s| s == store) {
            entry.stores.push(store.to_string());
        }
    }
}
