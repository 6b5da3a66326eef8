use crate::core::error::TesseraError;
use crate::core::time::{new_event_id, now_epoch_z};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only audit trail of mutating engine calls (`journal.jsonl`).
pub struct Journal {
    path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JournalEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub workspace: Option<String>,
    pub store: Option<String>,
    pub status: String,
}

impl Journal {
    pub fn new(home: &Path) -> Self {
        Self {
            path: home.join("journal.jsonl"),
        }
    }

    /// Run `f` and record its outcome. Journal write failures are logged, never
    /// surfaced over the operation's own result.
    pub fn scoped<F, R>(
        &self,
        op: &str,
        workspace: Option<&str>,
        store: Option<&str>,
        f: F,
    ) -> Result<R, TesseraError>
    where
        F: FnOnce() -> Result<R, TesseraError>,
    {
        let result = f();
        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        if let Err(e) = self.append(op, workspace, store, status) {
            tracing::warn!(op, error = %e, "failed to append journal event");
        }
        result
    }

    fn append(
        &self,
        op: &str,
        workspace: Option<&str>,
        store: Option<&str>,
        status: &str,
    ) -> Result<(), TesseraError> {
        let ev = JournalEvent {
            ts: now_epoch_z(),
            event_id: new_event_id(),
            op: op.to_string(),
            workspace: workspace.map(|s| s.to_string()),
            store: store.map(|s| s.to_string()),
            status: status.to_string(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)?;
        Ok(())
    }

    /// Read every event; unparseable lines are skipped.
    pub fn events(&self) -> Result<Vec<JournalEvent>, TesseraError> {
        let f = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TesseraError::IoError(e)),
        };
        let mut out = Vec::new();
        for line in BufReader::new(f).lines() {
            if let Ok(ev) = serde_json::from_str::<JournalEvent>(&line?) {
                out.push(ev);
            }
        }
        Ok(out)
    }
}
