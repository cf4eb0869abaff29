use serde::{Deserialize, Serialize};

/// Status value for a completed sync run. Per-item failures are folded into
/// the log lines; only auth and malformed-input errors abort a run.
pub const SYNC_STATUS_SUCCESS: &str = "success";

/// Outcome of a single reconciliation run: counters plus the ordered audit
/// trail. Persisted externally keyed by a content hash of the inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncResult {
    pub status: String,
    pub users_processed: i64,
    pub users_created: i64,
    pub users_updated: i64,
    pub users_deleted: i64,
    pub logs: Vec<String>,
}

impl SyncResult {
    pub fn success(
        users_processed: i64,
        users_created: i64,
        users_updated: i64,
        users_deleted: i64,
        logs: Vec<String>,
    ) -> Self {
        Self {
            status: SYNC_STATUS_SUCCESS.to_string(),
            users_processed,
            users_created,
            users_updated,
            users_deleted,
            logs,
        }
    }
}
