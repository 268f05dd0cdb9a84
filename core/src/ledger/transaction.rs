//! # Ledger Transactions
//!
//! A transaction is the audit entry for one mutation of the store: a schema
//! definition, a record creation or a record update. It carries a full
//! snapshot of what changed so the chain alone is enough to replay history.
//!
//! ## Sealed vs. stored copies
//!
//! `block_index` is bookkeeping, not content. The copy inside a block always
//! has it unset, and [`Transaction::canonical_bytes`] leaves it out of the
//! hash preimage entirely. The stored copy (the one returned by audit
//! lookups) gets the index of the block that sealed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{Fields, RecordSchema};

/// Opaque transaction identifier (UUID v4, hyphenated).
pub type TransactionId = String;

/// Opaque record identifier (UUID v4, hyphenated).
pub type RecordId = String;

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// What kind of mutation a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SchemaCreated,
    RecordCreated,
    RecordUpdated,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SchemaCreated => "schema_created",
            Self::RecordCreated => "record_created",
            Self::RecordUpdated => "record_updated",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TransactionPayload
// ---------------------------------------------------------------------------

/// Snapshot of the mutation. The variant determines the transaction kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionPayload {
    /// A schema was registered.
    SchemaCreated { schema: RecordSchema },

    /// A record was created with these (validated) fields.
    RecordCreated {
        record_id: RecordId,
        schema_name: String,
        fields: Fields,
        created_at: DateTime<Utc>,
    },

    /// A record's fields were replaced. `previous_fields` is the mapping
    /// that was overwritten.
    RecordUpdated {
        record_id: RecordId,
        schema_name: String,
        previous_fields: Fields,
        fields: Fields,
        updated_at: DateTime<Utc>,
    },
}

impl TransactionPayload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::SchemaCreated { .. } => TransactionKind::SchemaCreated,
            Self::RecordCreated { .. } => TransactionKind::RecordCreated,
            Self::RecordUpdated { .. } => TransactionKind::RecordUpdated,
        }
    }

    /// The record this payload touches, if any.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::SchemaCreated { .. } => None,
            Self::RecordCreated { record_id, .. } | Self::RecordUpdated { record_id, .. } => {
                Some(record_id)
            }
        }
    }

    /// Name of the schema involved.
    pub fn schema_name(&self) -> &str {
        match self {
            Self::SchemaCreated { schema } => &schema.name,
            Self::RecordCreated { schema_name, .. } | Self::RecordUpdated { schema_name, .. } => {
                schema_name
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One audit entry destined for exactly one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id, generated at construction.
    pub id: TransactionId,
    /// What changed.
    pub payload: TransactionPayload,
    /// Creation time, Unix milliseconds.
    pub timestamp: i64,
    /// Index of the sealing block. `None` while pending and inside blocks.
    #[serde(default)]
    pub block_index: Option<u64>,
}

/// The hashed view of a transaction: everything except `block_index`.
#[derive(Serialize)]
struct SealedView<'a> {
    id: &'a str,
    payload: &'a TransactionPayload,
    timestamp: i64,
}

impl Transaction {
    /// Wrap a payload in a fresh transaction stamped with the current time.
    pub fn new(payload: TransactionPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
            block_index: None,
        }
    }

    /// Transaction recording a new schema.
    pub fn schema_created(schema: RecordSchema) -> Self {
        Self::new(TransactionPayload::SchemaCreated { schema })
    }

    /// Transaction recording a new record.
    pub fn record_created(
        record_id: impl Into<RecordId>,
        schema_name: impl Into<String>,
        fields: Fields,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(TransactionPayload::RecordCreated {
            record_id: record_id.into(),
            schema_name: schema_name.into(),
            fields,
            created_at,
        })
    }

    /// Transaction recording a field replacement.
    pub fn record_updated(
        record_id: impl Into<RecordId>,
        schema_name: impl Into<String>,
        previous_fields: Fields,
        fields: Fields,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self::new(TransactionPayload::RecordUpdated {
            record_id: record_id.into(),
            schema_name: schema_name.into(),
            previous_fields,
            fields,
            updated_at,
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    /// Canonical serialization used in block hashing.
    ///
    /// Struct fields are emitted in declaration order and field maps are
    /// `BTreeMap`s, so the output is stable for equal transactions.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let view = SealedView {
            id: &self.id,
            payload: &self.payload,
            timestamp: self.timestamp,
        };
        serde_json::to_vec(&view).unwrap_or_default()
    }

    /// Copy suitable for inclusion in a block (no block index).
    pub fn sealed_copy(&self) -> Self {
        Self {
            block_index: None,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
