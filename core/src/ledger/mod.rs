//! # Ledger Engine
//!
//! ```text
//! transaction.rs  Audit entries and their payloads
//! block.rs        HashBlock, canonical hashing
//! pow.rs          Nonce search
//! chain.rs        Ledger: chain + pending queue, mining, validation
//! ```

pub mod block;
pub mod chain;
pub mod pow;
pub mod transaction;

pub use block::{compute_hash, BlockSummary, HashBlock};
pub use chain::{ChainAudit, ChainFault, Ledger, LedgerError, LedgerInfo};
pub use pow::{ProofOfWork, Solution};
pub use transaction::{
    RecordId, Transaction, TransactionId, TransactionKind, TransactionPayload,
};
