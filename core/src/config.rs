//! # Store Configuration & Constants
//!
//! Every magic number in the store lives here. Changing the genesis
//! constants after data has been written invalidates every persisted
//! chain, so treat them as frozen.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ledger Constants
// ---------------------------------------------------------------------------

/// Leading `'0'` characters a sealed block hash must carry by default.
///
/// Two hex zeros means roughly 256 hash attempts per block on average.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Hard ceiling on configurable difficulty. A SHA-256 hex digest has 64
/// characters; anything past ~8 will not terminate on commodity hardware.
pub const MAX_DIFFICULTY: u32 = 64;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Index of the genesis block.
pub const GENESIS_INDEX: u64 = 0;

// ---------------------------------------------------------------------------
// Schema Constants
// ---------------------------------------------------------------------------

/// Version string stamped on newly defined schemas. Never auto-incremented.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Persistence Layout
// ---------------------------------------------------------------------------

/// sled tree holding schema definitions keyed by name.
pub const TREE_SCHEMAS: &str = "schemas";

/// sled tree holding records keyed by record id.
pub const TREE_RECORDS: &str = "records";

/// sled tree holding every transaction ever produced, keyed by id.
pub const TREE_TRANSACTIONS: &str = "transactions";

/// sled tree holding the pending queue: sequence (u64 BE) -> transaction id.
pub const TREE_PENDING: &str = "pending";

/// sled tree holding sealed blocks keyed by index (u64 BE).
pub const TREE_BLOCKS: &str = "blocks";

/// sled tree for bookkeeping values.
pub const TREE_METADATA: &str = "metadata";

/// Metadata key for the index of the latest committed block.
pub const META_LATEST_BLOCK_INDEX: &[u8] = b"latest_block_index";

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Tunable parameters for a [`crate::store::RecordStore`] and its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of leading `'0'` hex characters required of a sealed block hash.
    pub difficulty: u32,

    /// Optional cap on proof-of-work attempts per block. `None` searches
    /// until a nonce is found, however long that takes.
    pub max_nonce: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_nonce: None,
        }
    }
}

impl StoreConfig {
    /// Configuration with the given difficulty and no proof-of-work cap.
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty: difficulty.min(MAX_DIFFICULTY),
            ..Default::default()
        }
    }
}
