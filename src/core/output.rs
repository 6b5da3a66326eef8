//! Compact output rendering helpers for CLI surfaces.
//!
//! Keeps command result output bounded and readable while preserving signal.

use crate::core::error::TesseraError;
use crate::core::time::{new_event_id, now_epoch_z};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Join up to `max_items` entries, noting how many were left out.
pub fn preview_items(items: &[String], max_items: usize) -> String {
    let shown = items
        .iter()
        .take(max_items)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > max_items {
        format!("{} (+{} more)", shown, items.len() - max_items)
    } else {
        shown
    }
}

const ENVELOPE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Error,
}

/// One `--format json` document. Exactly one of `result` / `error` is set.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub envelope_version: &'static str,
    pub ts: String,
    pub event_id: String,
    pub cmd: String,
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    /// Conflicting paths, for `conflict` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
}

impl Envelope {
    fn new(cmd: &str, status: EnvelopeStatus) -> Self {
        Self {
            envelope_version: ENVELOPE_VERSION,
            ts: now_epoch_z(),
            event_id: new_event_id(),
            cmd: cmd.to_string(),
            status,
            result: None,
            error: None,
        }
    }

    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Success envelope; the payload lands under `result`.
pub fn success_envelope<T: Serialize>(cmd: &str, payload: &T) -> Result<JsonValue, TesseraError> {
    let mut env = Envelope::new(cmd, EnvelopeStatus::Ok);
    env.result = Some(serde_json::to_value(payload)?);
    Ok(env.to_value())
}

/// Error envelope carrying the stable error kind.
pub fn error_envelope(cmd: &str, err: &TesseraError) -> JsonValue {
    let mut env = Envelope::new(cmd, EnvelopeStatus::Error);
    env.error = Some(ErrorBody {
        kind: err.kind(),
        message: err.to_string(),
        paths: match err {
            TesseraError::Conflict { paths } => Some(paths.clone()),
            _ => None,
        },
    });
    env.to_value()
}
