//! Clock and identifier helpers for persisted records.

use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Record timestamp: epoch seconds with a `Z` suffix, e.g. `1771220592Z`.
pub fn now_epoch_z() -> String {
    format!("{}Z", epoch_secs())
}

/// Unique id for journal events, envelopes and temp-file names.
pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
