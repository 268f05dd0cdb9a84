//! Stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{RecordId, TransactionId};
use crate::schema::Fields;

/// A validated instance of a schema.
///
/// `ledger_transaction_id` points at the latest transaction that touched
/// the record. `ledger_block_index` stays `None` until that transaction is
/// sealed, and goes back to `None` on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub schema_name: String,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub ledger_transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub ledger_block_index: Option<u64>,
}

impl Record {
    /// `true` once the latest transaction touching this record is in a block.
    pub fn is_sealed(&self) -> bool {
        self.ledger_block_index.is_some()
    }

    /// `true` if every criterion is present in `fields` with a matching
    /// value. Empty criteria match everything.
    pub fn matches(&self, criteria: &Fields) -> bool {
        criteria.iter().all(|(name, wanted)| {
            self.fields
                .get(name)
                .map_or(false, |value| value.matches(wanted))
        })
    }
}
