//! # Ledger
//!
//! Owns the chain of sealed blocks and the queue of pending transactions.
//!
//! ## Mining
//!
//! Mining is split in two so a caller can persist a block before the
//! in-memory chain moves:
//!
//! ```text
//! prepare_block()  pending -> candidate -> proof-of-work   (chain untouched)
//! append_sealed()  check linkage + difficulty -> push -> clear pending
//! ```
//!
//! [`Ledger::mine`] runs both back to back. Either a block is appended and
//! pending is cleared, or nothing changes.
//!
//! ## Validation
//!
//! [`Ledger::validate`] answers "is the chain intact" with a bool.
//! [`Ledger::audit`] walks the whole chain and reports every fault it finds.
//! Neither treats a damaged chain as an error.

use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::block::{BlockSummary, HashBlock};
use super::pow::ProofOfWork;
use super::transaction::Transaction;
use crate::config::StoreConfig;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors returned by mining operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Nothing to seal.
    #[error("no pending transactions to mine")]
    NoPendingWork,

    /// The configured proof-of-work cap was reached without a solution.
    #[error("no nonce found for block {index} within {attempts} attempts")]
    NonceSpaceExhausted { index: u64, attempts: u64 },

    /// The block does not extend the current tip.
    #[error("block {found} does not extend the chain tip (expected index {expected})")]
    OutOfOrderBlock { expected: u64, found: u64 },

    /// The block's hash is wrong or misses the difficulty target.
    #[error("block {index} fails proof-of-work verification")]
    InvalidProofOfWork { index: u64 },
}

// ---------------------------------------------------------------------------
// Audit Types
// ---------------------------------------------------------------------------

/// A single integrity fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ChainFault {
    /// Stored hash does not match the block content.
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },
    /// `previous_hash` does not match the preceding block's hash.
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },
}

impl ChainFault {
    pub fn index(&self) -> u64 {
        match self {
            Self::HashMismatch { index, .. } | Self::BrokenLink { index, .. } => *index,
        }
    }
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch { index, stored, computed } => {
                write!(f, "block {index}: hash mismatch (stored {stored}, computed {computed})")
            }
            Self::BrokenLink { index, expected, found } => {
                write!(f, "block {index}: previous_hash {found} does not match {expected}")
            }
        }
    }
}

/// Result of a full chain scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAudit {
    pub blocks_checked: usize,
    pub faults: Vec<ChainFault>,
}

impl ChainAudit {
    pub fn is_valid(&self) -> bool {
        self.faults.is_empty()
    }

    /// Lowest block index with a fault.
    pub fn first_fault(&self) -> Option<u64> {
        self.faults.iter().map(ChainFault::index).min()
    }
}

/// Point-in-time ledger status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub chain_length: usize,
    pub pending_count: usize,
    pub difficulty: u32,
    pub is_valid: bool,
    pub latest_block: BlockSummary,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Hash-chained block list plus the pending queue.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<HashBlock>,
    pending: Vec<Transaction>,
    pow: ProofOfWork,
}

impl Ledger {
    /// Fresh ledger with a new genesis block and no proof-of-work cap.
    pub fn new(difficulty: u32) -> Self {
        Self::with_config(&StoreConfig::with_difficulty(difficulty))
    }

    /// Fresh ledger using `config`.
    pub fn with_config(config: &StoreConfig) -> Self {
        Self::from_parts(Vec::new(), Vec::new(), config)
    }

    /// Restore a ledger from persisted state.
    ///
    /// An empty `chain` gets a fresh genesis block. No integrity check is
    /// done here; call [`validate`](Self::validate) or [`audit`](Self::audit).
    pub fn from_parts(
        mut chain: Vec<HashBlock>,
        pending: Vec<Transaction>,
        config: &StoreConfig,
    ) -> Self {
        if chain.is_empty() {
            chain.push(HashBlock::genesis(Utc::now().timestamp_millis()));
        }
        let pow = ProofOfWork::new(config.difficulty).with_max_iterations(config.max_nonce);
        Self { chain, pending, pow }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn chain(&self) -> &[HashBlock] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty
    }

    pub fn genesis(&self) -> &HashBlock {
        &self.chain[0]
    }

    /// The chain tip. There is always at least the genesis block.
    pub fn latest_block(&self) -> &HashBlock {
        self.chain.last().unwrap_or(&self.chain[0])
    }

    pub fn block(&self, index: u64) -> Option<&HashBlock> {
        usize::try_from(index).ok().and_then(|i| self.chain.get(i))
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    // -- Pending queue ------------------------------------------------------

    /// Append a transaction to the pending queue.
    pub fn enqueue(&mut self, transaction: Transaction) {
        debug!(
            tx_id = %transaction.id,
            kind = %transaction.kind(),
            pending = self.pending.len() + 1,
            "transaction enqueued"
        );
        self.pending.push(transaction);
    }

    // -- Mining -------------------------------------------------------------

    /// Build and seal the next block from all pending transactions without
    /// modifying the ledger.
    pub fn prepare_block(&self) -> Result<HashBlock, LedgerError> {
        if self.pending.is_empty() {
            return Err(LedgerError::NoPendingWork);
        }

        let index = self.chain.len() as u64;
        let transactions = self.pending.iter().map(Transaction::sealed_copy).collect();
        let mut block = HashBlock::seal(
            index,
            transactions,
            Utc::now().timestamp_millis(),
            self.latest_block().hash.clone(),
        );

        let attempts = self
            .pow
            .seal(&mut block)
            .ok_or(LedgerError::NonceSpaceExhausted {
                index,
                attempts: self.pow.max_iterations.unwrap_or(u64::MAX),
            })?;

        debug!(index, nonce = block.nonce, attempts, "proof-of-work solved");
        Ok(block)
    }

    /// Append a block produced by [`prepare_block`](Self::prepare_block)
    /// and drop its transactions from the pending queue.
    pub fn append_sealed(&mut self, block: HashBlock) -> Result<(), LedgerError> {
        let expected = self.chain.len() as u64;
        if block.index != expected || block.previous_hash != self.latest_block().hash {
            return Err(LedgerError::OutOfOrderBlock {
                expected,
                found: block.index,
            });
        }
        if !block.verify_hash() || !block.meets_difficulty(self.pow.difficulty) {
            return Err(LedgerError::InvalidProofOfWork { index: block.index });
        }

        let sealed: HashSet<&str> = block.transactions.iter().map(|tx| tx.id.as_str()).collect();
        self.pending.retain(|tx| !sealed.contains(tx.id.as_str()));

        info!(
            index = block.index,
            nonce = block.nonce,
            transactions = block.transactions.len(),
            hash = %block.hash,
            "block sealed"
        );
        self.chain.push(block);
        Ok(())
    }

    /// Seal all pending transactions into a new block and append it.
    pub fn mine(&mut self) -> Result<HashBlock, LedgerError> {
        let block = self.prepare_block()?;
        self.append_sealed(block.clone())?;
        Ok(block)
    }

    // -- Validation ---------------------------------------------------------

    /// `true` if every non-genesis block hashes correctly and links to its
    /// predecessor.
    pub fn validate(&self) -> bool {
        self.chain
            .windows(2)
            .all(|pair| pair[1].verify_hash() && pair[1].previous_hash == pair[0].hash)
    }

    /// Scan the full chain and collect every fault.
    pub fn audit(&self) -> ChainAudit {
        let mut faults = Vec::new();

        for pair in self.chain.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);

            let computed = block.recompute_hash();
            if computed != block.hash {
                faults.push(ChainFault::HashMismatch {
                    index: block.index,
                    stored: block.hash.clone(),
                    computed,
                });
            }
            if block.previous_hash != prev.hash {
                faults.push(ChainFault::BrokenLink {
                    index: block.index,
                    expected: prev.hash.clone(),
                    found: block.previous_hash.clone(),
                });
            }
        }

        for fault in &faults {
            warn!(index = fault.index(), %fault, "chain tampering detected");
        }

        ChainAudit {
            blocks_checked: self.chain.len(),
            faults,
        }
    }

    /// Current status, computed on demand.
    pub fn info(&self) -> LedgerInfo {
        LedgerInfo {
            chain_length: self.chain.len(),
            pending_count: self.pending.len(),
            difficulty: self.pow.difficulty,
            is_valid: self.validate(),
            latest_block: self.latest_block().summary(),
        }
    }

    /// Mutable chain access for tamper tests.
    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut Vec<HashBlock> {
        &mut self.chain
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
