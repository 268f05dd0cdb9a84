//! # Hash Blocks
//!
//! A block seals an ordered batch of transactions under a SHA-256 content
//! hash that also covers the previous block's hash, forming the chain.
//!
//! ## Hash Preimage
//!
//! ```text
//! index           u64 LE
//! timestamp       i64 LE (Unix ms)
//! previous_hash   UTF-8 bytes, then 0x00
//! tx count        u64 LE
//! per tx          u64 LE length || canonical JSON (insertion order)
//! nonce           u64 LE
//! ```
//!
//! The nonce comes last so the proof-of-work search can hash the prefix
//! once and clone the hasher state for each attempt.

use serde::{Deserialize, Serialize};
use sha2::Digest;

use super::transaction::Transaction;
use crate::config::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH};
use crate::crypto::{finalize_hex, has_zero_prefix, Sha256};

// ---------------------------------------------------------------------------
// HashBlock
// ---------------------------------------------------------------------------

/// A sealed batch of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashBlock {
    /// Position in the chain. Genesis is 0.
    pub index: u64,
    /// Transactions in enqueue order.
    pub transactions: Vec<Transaction>,
    /// Sealing time, Unix milliseconds.
    pub timestamp: i64,
    /// Hash of the block at `index - 1`, or `"0"` for genesis.
    pub previous_hash: String,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Lowercase hex SHA-256 of the fields above.
    pub hash: String,
}

/// Short description of a block for status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub index: u64,
    pub hash: String,
    pub timestamp: i64,
    pub transaction_count: usize,
}

impl HashBlock {
    /// The first block of every chain: no transactions, not mined.
    pub fn genesis(timestamp: i64) -> Self {
        Self::seal(GENESIS_INDEX, Vec::new(), timestamp, GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Build a block with nonce 0 and its hash computed.
    pub fn seal(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: i64,
        previous_hash: String,
    ) -> Self {
        let hash = compute_hash(index, &transactions, timestamp, &previous_hash, 0);
        Self {
            index,
            transactions,
            timestamp,
            previous_hash,
            nonce: 0,
            hash,
        }
    }

    /// Re-derive the hash from the current field values.
    pub fn recompute_hash(&self) -> String {
        compute_hash(
            self.index,
            &self.transactions,
            self.timestamp,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// `true` if the stored hash matches the content.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    /// `true` if the stored hash carries `difficulty` leading zeros.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        has_zero_prefix(&self.hash, difficulty as usize)
    }

    /// Hasher state after absorbing everything except the nonce.
    pub fn preimage_prefix(&self) -> Sha256 {
        hash_prefix(self.index, &self.transactions, self.timestamp, &self.previous_hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            hash: self.hash.clone(),
            timestamp: self.timestamp,
            transaction_count: self.transactions.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Deterministic content hash over all five block fields.
pub fn compute_hash(
    index: u64,
    transactions: &[Transaction],
    timestamp: i64,
    previous_hash: &str,
    nonce: u64,
) -> String {
    hash_with_nonce(hash_prefix(index, transactions, timestamp, previous_hash), nonce)
}

/// Finish a prefix state with the given nonce.
pub fn hash_with_nonce(mut prefix: Sha256, nonce: u64) -> String {
    prefix.update(nonce.to_le_bytes());
    finalize_hex(prefix)
}

fn hash_prefix(
    index: u64,
    transactions: &[Transaction],
    timestamp: i64,
    previous_hash: &str,
) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update([0u8]);
    hasher.update((transactions.len() as u64).to_le_bytes());
    for tx in transactions {
        let bytes = tx.canonical_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    hasher
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::TransactionPayload;
    use crate::schema::Fields;
    use chrono::Utc;
    use serde_json::json;

    fn make_test_tx(name: &str) -> Transaction {
        let fields: Fields = serde_json::from_value(json!({"name": name})).unwrap();
        Transaction::record_created(format!("rec-{name}"), "User", fields, Utc::now())
    }

    #[test]
    fn genesis_shape() {
        let g = HashBlock::genesis(0);
        assert!(g.is_genesis());
        assert_eq!(g.previous_hash, "0");
        assert!(g.transactions.is_empty());
        assert_eq!(g.nonce, 0);
        assert!(g.verify_hash());
        assert_eq!(g.hash.len(), 64);
    }

    #[test]
    fn hash_is_deterministic() {
        let txs = vec![make_test_tx("a"), make_test_tx("b")];
        let h1 = compute_hash(3, &txs, 1_700_000_000_000, "abc", 42);
        let h2 = compute_hash(3, &txs, 1_700_000_000_000, "abc", 42);
        assert_eq!(h1, h2);
    }

    #[test]
    fn every_field_affects_hash() {
        let txs = vec![make_test_tx("a"), make_test_tx("b")];
        let base = compute_hash(1, &txs, 10, "prev", 0);
        assert_ne!(base, compute_hash(2, &txs, 10, "prev", 0));
        assert_ne!(base, compute_hash(1, &txs, 11, "prev", 0));
        assert_ne!(base, compute_hash(1, &txs, 10, "prev2", 0));
        assert_ne!(base, compute_hash(1, &txs, 10, "prev", 1));
        assert_ne!(base, compute_hash(1, &txs[..1], 10, "prev", 0));

        let reversed: Vec<_> = txs.iter().rev().cloned().collect();
        assert_ne!(base, compute_hash(1, &reversed, 10, "prev", 0));
    }

    #[test]
    fn prefix_plus_nonce_matches_full_hash() {
        let block = HashBlock::seal(1, vec![make_test_tx("a")], 99, "p".into());
        for nonce in [0u64, 1, 12_345] {
            assert_eq!(
                hash_with_nonce(block.preimage_prefix(), nonce),
                compute_hash(1, &block.transactions, 99, "p", nonce)
            );
        }
    }

    #[test]
    fn tampering_breaks_verification() {
        let mut block = HashBlock::seal(1, vec![make_test_tx("a")], 99, "p".into());
        assert!(block.verify_hash());

        let payload = &mut block.transactions[0].payload;
        if let TransactionPayload::RecordCreated { fields, .. } = payload {
            fields.insert("name".into(), "mallory".into());
        }
        assert!(!block.verify_hash());
    }

    #[test]
    fn linking_block_index_keeps_hash_valid() {
        let mut block = HashBlock::seal(1, vec![make_test_tx("a")], 99, "p".into());
        block.transactions[0].block_index = Some(1);
        assert!(block.verify_hash());
    }

    #[test]
    fn summary_and_serde() {
        let block = HashBlock::seal(4, vec![make_test_tx("a"), make_test_tx("b")], 5, "x".into());
        let s = block.summary();
        assert_eq!(s.index, 4);
        assert_eq!(s.transaction_count, 2);
        assert_eq!(s.hash, block.hash);

        let json = serde_json::to_string(&block).unwrap();
        let back: HashBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
        assert!(back.verify_hash());
    }
}
