//! Workspace-relative path handling.
//!
//! Every path the engine persists (manifest entries, ledger keys) is a
//! `/`-separated path relative to the workspace root, with no `.` or `..`
//! components. The workspace root is the repository root unless a
//! sub-directory workspace is selected.

use crate::core::error::TesseraError;
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize `path`, folding `.` and `..` without touching the filesystem.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Resolve a caller-supplied path (absolute, cwd-relative, or containing `..`)
/// to canonical form relative to `anchor`.
pub fn resolve_under(anchor: &Path, cwd: &Path, input: &str) -> Result<String, TesseraError> {
    if input.trim().is_empty() {
        return Err(TesseraError::ValidationError(
            "empty path is not allowed".to_string(),
        ));
    }
    let raw = Path::new(input);
    let absolute = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        cwd.join(raw)
    };
    let normalized = normalize_lexical(&absolute);
    let rel = normalized.strip_prefix(anchor).map_err(|_| {
        TesseraError::ValidationError(format!(
            "path '{}' escapes {}",
            input,
            anchor.display()
        ))
    })?;
    let joined = join_components(rel);
    if joined.is_empty() {
        return Err(TesseraError::ValidationError(format!(
            "path '{}' resolves to {} itself",
            input,
            anchor.display()
        )));
    }
    Ok(joined)
}

/// Validate an already-relative path string, returning its canonical form.
pub fn validate_rel_path(rel: &str) -> Result<String, TesseraError> {
    let path = Path::new(rel);
    if path.is_absolute() {
        return Err(TesseraError::ValidationError(format!(
            "absolute path '{}' is not allowed",
            rel
        )));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(TesseraError::ValidationError(format!(
            "path '{}' must not traverse outside the repository",
            rel
        )));
    }
    let joined = join_components(path);
    if joined.is_empty() {
        return Err(TesseraError::ValidationError(format!(
            "path '{}' resolves to the repository root",
            rel
        )));
    }
    Ok(joined)
}

fn join_components(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Number of separators in a relative path.
pub fn depth(rel: &str) -> usize {
    rel.matches('/').count()
}

/// `path` equals `declared` or lives beneath it.
pub fn is_covered_by(path: &str, declared: &str) -> bool {
    path == declared
        || (path.len() > declared.len()
            && path.starts_with(declared)
            && path.as_bytes()[declared.len()] == b'/')
}

/// `path` is a strict ancestor directory of `declared`.
pub fn is_ancestor_of(path: &str, declared: &str) -> bool {
    is_covered_by(declared, path) && declared != path
}

/// Deepest first; equal depth in reverse lexicographic order. Children always
/// sort before their parent directories.
pub fn removal_order(a: &str, b: &str) -> Ordering {
    depth(b).cmp(&depth(a)).then_with(|| b.cmp(a))
}
