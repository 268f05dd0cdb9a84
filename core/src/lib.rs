// Copyright (c) 2026 Chainstore Contributors. MIT License.
// See LICENSE for details.

//! # Chainstore Core Library
//!
//! A single-node data store that writes every schema and record mutation
//! into an append-only, hash-chained ledger. No consensus, no network: the
//! chain exists so that anyone holding a copy can tell whether history was
//! rewritten.
//!
//! ## Architecture
//!
//! - **schema**: Field kinds, field values, schemas and the validator.
//! - **ledger**: Transactions, hash blocks, proof-of-work, the chain.
//! - **store**: `RecordStore`: CRUD over records, mining, export.
//! - **storage**: The `Backend` trait with sled and in-memory backends.
//! - **crypto**: SHA-256 helpers.
//! - **config**: Constants and `StoreConfig`.
//!
//! ## Quick Start
//!
//! ```
//! use chainstore_core::prelude::*;
//! use serde_json::json;
//!
//! let mut store = RecordStore::open(MemoryBackend::new(), StoreConfig::with_difficulty(1))?;
//! store.define_schema(
//!     "User",
//!     vec![
//!         FieldSpec::new("name", FieldKind::Text),
//!         FieldSpec::new("active", FieldKind::Boolean).with_default(true),
//!     ],
//!     "application users",
//! )?;
//!
//! let fields: Fields = serde_json::from_value(json!({"name": "Ada"}))?;
//! let id = store.create("User", fields)?;
//!
//! let block = store.mine()?;
//! assert_eq!(store.get(&id).unwrap().ledger_block_index, Some(block.index));
//! assert!(store.validate_chain());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod schema;
pub mod storage;
pub mod store;

/// The types most callers need.
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::ledger::{HashBlock, Ledger, LedgerError, Transaction, TransactionKind};
    pub use crate::schema::{FieldKind, FieldSpec, FieldValue, Fields, RecordSchema};
    pub use crate::storage::{Backend, MemoryBackend, SledBackend};
    pub use crate::store::{Record, RecordStore, Snapshot, StoreError};
}
