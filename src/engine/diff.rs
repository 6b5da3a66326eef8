//! Line-level unified diff built on a longest-common-subsequence table.

use serde::Serialize;
use std::fmt::Write as _;

pub const CONTEXT_LINES: usize = 3;
pub const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            range(self.old_start, self.old_count),
            range(self.new_start, self.new_count)
        )
    }
}

fn range(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{},{}", start, count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub old_label: String,
    pub new_label: String,
    pub binary: bool,
    /// Every `+` line in the change, not only those inside rendered hunks.
    pub additions: usize,
    pub deletions: usize,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    pub fn is_empty(&self) -> bool {
        !self.binary && self.hunks.is_empty()
    }

    /// Render as unified diff text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.binary {
            let _ = writeln!(
                out,
                "Binary files {} and {} differ",
                self.old_label, self.new_label
            );
            return out;
        }
        if self.hunks.is_empty() {
            return out;
        }
        let _ = writeln!(out, "--- {}", self.old_label);
        let _ = writeln!(out, "+++ {}", self.new_label);
        for hunk in &self.hunks {
            let _ = writeln!(out, "{}", hunk.header());
            for line in &hunk.lines {
                let _ = match line {
                    DiffLine::Context(t) => writeln!(out, " {}", t),
                    DiffLine::Added(t) => writeln!(out, "+{}", t),
                    DiffLine::Removed(t) => writeln!(out, "-{}", t),
                };
            }
        }
        out
    }
}

/// NUL bytes or invalid UTF-8.
pub fn is_binary(data: &[u8]) -> bool {
    data.contains(&0) || std::str::from_utf8(data).is_err()
}

fn split_lines(data: Option<&[u8]>) -> Vec<&str> {
    match data.and_then(|d| std::str::from_utf8(d).ok()) {
        Some(text) => text.split_terminator('\n').collect(),
        None => Vec::new(),
    }
}

/// Diff `old` (store side) against `new` (workspace side). `None` means the
/// file is absent on that side and is labelled `/dev/null`.
pub fn diff_file(path: &str, old: Option<&[u8]>, new: Option<&[u8]>) -> FileDiff {
    let old_label = old.map_or_else(|| DEV_NULL.to_string(), |_| format!("a/{}", path));
    let new_label = new.map_or_else(|| DEV_NULL.to_string(), |_| format!("b/{}", path));
    if old.is_some_and(is_binary) || new.is_some_and(is_binary) {
        return FileDiff {
            old_label,
            new_label,
            binary: old != new,
            additions: 0,
            deletions: 0,
            hunks: Vec::new(),
        };
    }
    let edits = diff_lines(&split_lines(old), &split_lines(new));
    let additions = edits.iter().filter(|e| matches!(e, DiffLine::Added(_))).count();
    let deletions = edits.iter().filter(|e| matches!(e, DiffLine::Removed(_))).count();
    FileDiff {
        old_label,
        new_label,
        binary: false,
        additions,
        deletions,
        hunks: build_hunks(&edits),
    }
}

/// Full edit script between two line sequences.
///
/// The LCS table is filled backward from the ends; the forward walk emits
/// context where both sides agree and, on disagreement, prefers an insertion
/// whenever it keeps at least as long a remaining match as a deletion.
pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            edits.push(DiffLine::Context(old[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i * width + j + 1] >= lcs[(i + 1) * width + j] {
            edits.push(DiffLine::Added(new[j].to_string()));
            j += 1;
        } else {
            edits.push(DiffLine::Removed(old[i].to_string()));
            i += 1;
        }
    }
    edits.extend(old[i..].iter().map(|l| DiffLine::Removed(l.to_string())));
    edits.extend(new[j..].iter().map(|l| DiffLine::Added(l.to_string())));
    edits
}

/// Group changes into hunks with [`CONTEXT_LINES`] of context, merging
/// hunks whose context windows touch or overlap.
pub fn build_hunks(edits: &[DiffLine]) -> Vec<Hunk> {
    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| !matches!(e, DiffLine::Context(_)))
        .map(|(idx, _)| idx)
        .collect();
    let Some(&first) = changes.first() else {
        return Vec::new();
    };

    let mut windows: Vec<(usize, usize)> = Vec::new();
    let mut start = first.saturating_sub(CONTEXT_LINES);
    let mut end = (first + 1 + CONTEXT_LINES).min(edits.len());
    for &idx in &changes[1..] {
        let next_start = idx.saturating_sub(CONTEXT_LINES);
        if next_start <= end {
            end = (idx + 1 + CONTEXT_LINES).min(edits.len());
        } else {
            windows.push((start, end));
            start = next_start;
            end = (idx + 1 + CONTEXT_LINES).min(edits.len());
        }
    }
    windows.push((start, end));

    // Line numbers (0-based) on each side before every edit.
    let mut old_pos = Vec::with_capacity(edits.len() + 1);
    let mut new_pos = Vec::with_capacity(edits.len() + 1);
    let (mut o, mut n) = (0usize, 0usize);
    for edit in edits {
        old_pos.push(o);
        new_pos.push(n);
        match edit {
            DiffLine::Context(_) => {
                o += 1;
                n += 1;
            }
            DiffLine::Removed(_) => o += 1,
            DiffLine::Added(_) => n += 1,
        }
    }

    windows
        .into_iter()
        .map(|(s, e)| {
            let lines = edits[s..e].to_vec();
            let old_count = lines
                .iter()
                .filter(|l| !matches!(l, DiffLine::Added(_)))
                .count();
            let new_count = lines
                .iter()
                .filter(|l| !matches!(l, DiffLine::Removed(_)))
                .count();
            Hunk {
                old_start: if old_count == 0 { old_pos[s] } else { old_pos[s] + 1 },
                old_count,
                new_start: if new_count == 0 { new_pos[s] } else { new_pos[s] + 1 },
                new_count,
                lines,
            }
        })
        .collect()
}
