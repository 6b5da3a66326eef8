//! Store data model.
//!
//! Two catalog scopes are supported: `Global` (shared across every repository
//! on this machine) and `Component` (local to one repository). The same store
//! ID may exist in both; they are independent stores.

use crate::core::error::TesseraError;
use crate::core::time::now_epoch_z;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SCHEMA_VERSION: u32 = 1;

/// Catalog scope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Machine-wide catalog under the tessera home directory.
    Global,
    /// Repository-local catalog under `<repo>/.tessera/stores`.
    Component,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Component => "component",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Scope::Global),
            "component" => Ok(Scope::Component),
            other => Err(TesseraError::ValidationError(format!(
                "unknown scope '{}': expected 'global' or 'component'",
                other
            ))),
        }
    }
}

/// How a store's content is materialized into a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Symlink,
    Copy,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Symlink => "symlink",
            Mode::Copy => "copy",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symlink" => Ok(Mode::Symlink),
            "copy" => Ok(Mode::Copy),
            other => Err(TesseraError::ValidationError(format!(
                "unknown mode '{}': expected 'symlink' or 'copy'",
                other
            ))),
        }
    }
}

/// Who created a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreSource {
    #[default]
    Human,
    Agent,
    Other,
}

impl FromStr for StoreSource {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(StoreSource::Human),
            "agent" => Ok(StoreSource::Agent),
            "other" => Ok(StoreSource::Other),
            other => Err(TesseraError::ValidationError(format!(
                "unknown source '{}': expected 'human', 'agent' or 'other'",
                other
            ))),
        }
    }
}

/// Store metadata document (`meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMeta {
    pub name: String,
    pub scope: Scope,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: StoreSource,
    /// Free-form category.
    #[serde(rename = "type", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub schema_version: u32,
}

impl StoreMeta {
    pub fn new(name: &str, scope: Scope) -> Self {
        let now = now_epoch_z();
        Self {
            name: name.to_string(),
            scope,
            description: None,
            source: StoreSource::default(),
            category: None,
            owner: None,
            task_id: None,
            parent_task_id: None,
            priority: None,
            status: None,
            created_at: now.clone(),
            updated_at: now,
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_epoch_z();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    #[default]
    File,
    Directory,
}

impl FromStr for TrackKind {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(TrackKind::File),
            "directory" | "dir" => Ok(TrackKind::Directory),
            other => Err(TesseraError::ValidationError(format!(
                "unknown kind '{}': expected 'file' or 'directory'",
                other
            ))),
        }
    }
}

/// A declared path, relative to the workspace root, managed by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPath {
    pub path: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Track manifest document (`track.json`). Path-keyed set in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub tracked: Vec<TrackedPath>,
}

impl Default for TrackManifest {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tracked: Vec::new(),
        }
    }
}

impl TrackManifest {
    pub fn get(&self, path: &str) -> Option<&TrackedPath> {
        self.tracked.iter().find(|t| t.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Inserts `entry` unless its path is already declared. Returns whether it was added.
    pub fn insert(&mut self, entry: TrackedPath) -> bool {
        if self.contains(&entry.path) {
            return false;
        }
        self.tracked.push(entry);
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.tracked.len();
        self.tracked.retain(|t| t.path != path);
        self.tracked.len() != before
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(|t| t.path.as_str())
    }
}

/// Fully-resolved store identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreRef {
    pub id: String,
    pub scope: Scope,
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.id)
    }
}
