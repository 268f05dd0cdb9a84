//! Full-state snapshot for external backup.

use serde::{Deserialize, Serialize};

use super::record::Record;
use crate::ledger::HashBlock;
use crate::schema::RecordSchema;

/// Everything in the store, as one document.
///
/// ```json
/// {
///   "schemas": [...],
///   "records": [...],
///   "ledger": { "chain": [...], "pending_count": 0, "difficulty": 2, "is_valid": true }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schemas: Vec<RecordSchema>,
    pub records: Vec<Record>,
    pub ledger: LedgerSnapshot,
}

/// Ledger part of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain: Vec<HashBlock>,
    pub pending_count: usize,
    pub difficulty: u32,
    pub is_valid: bool,
}

impl Snapshot {
    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
