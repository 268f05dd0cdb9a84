//! # Storage Module
//!
//! Persistence for schemas, records, transactions and blocks.
//!
//! ```text
//! mod.rs     Backend trait, DbError
//! db.rs      SledBackend: named sled trees, multi-tree transactions
//! memory.rs  MemoryBackend: the same tables behind a RwLock
//! ```
//!
//! ## Atomicity
//!
//! Every mutation the store performs maps to exactly one backend call, and
//! every backend call is all-or-nothing. In particular [`Backend::commit_block`]
//! writes the block, the block index of each sealed transaction, the linked
//! records and the pending-queue removals together. A sealed block is never
//! visible without its linkage, and vice versa.
//!
//! ## Encoding
//!
//! Values are stored as JSON. Field values and transaction payloads are
//! self-describing, which a non-self-describing format cannot round-trip.

pub mod db;
pub mod memory;

pub use db::SledBackend;
pub use memory::MemoryBackend;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ledger::{HashBlock, Transaction};
use crate::schema::RecordSchema;
use crate::store::Record;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data is inconsistent (dangling reference, gap in the chain).
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// Write refused by the backend (used by test and read-only backends).
    #[error("write rejected: {0}")]
    Rejected(String),
}

pub type DbResult<T> = Result<T, DbError>;

pub(crate) fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| DbError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    serde_json::from_slice(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Durable storage used by [`crate::store::RecordStore`].
///
/// Methods take `&self`; implementations handle their own interior
/// mutability. The store is the only writer.
pub trait Backend {
    /// All schema definitions, in any order.
    fn load_schemas(&self) -> DbResult<Vec<RecordSchema>>;

    /// All records, in any order.
    fn load_records(&self) -> DbResult<Vec<Record>>;

    /// The chain in index order. Empty if nothing was ever written.
    fn load_blocks(&self) -> DbResult<Vec<HashBlock>>;

    /// Transactions not yet sealed, in enqueue order.
    fn load_pending(&self) -> DbResult<Vec<Transaction>>;

    /// Stored copy of a transaction, with its block index once sealed.
    fn load_transaction(&self, id: &str) -> DbResult<Option<Transaction>>;

    /// Store a new schema and queue its transaction.
    fn put_schema(&self, schema: &RecordSchema, tx: &Transaction) -> DbResult<()>;

    /// Store a created or updated record and queue its transaction.
    fn put_record(&self, record: &Record, tx: &Transaction) -> DbResult<()>;

    /// Store the genesis block of an empty chain.
    fn put_genesis(&self, block: &HashBlock) -> DbResult<()>;

    /// Commit a sealed block together with its linkage. `linked` holds the
    /// records whose block index now points at `block`.
    fn commit_block(&self, block: &HashBlock, linked: &[Record]) -> DbResult<()>;
}
