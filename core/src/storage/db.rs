//! # SledBackend: Persistent Storage Engine
//!
//! The on-disk backend, built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                   | Value                    |
//! |----------------|-----------------------|--------------------------|
//! | `schemas`      | schema name (UTF-8)   | `json(RecordSchema)`     |
//! | `records`      | record id (UTF-8)     | `json(Record)`           |
//! | `transactions` | tx id (UTF-8)         | `json(Transaction)`      |
//! | `pending`      | sequence (8B BE)      | tx id (UTF-8)            |
//! | `blocks`       | index (8B BE)         | `json(HashBlock)`        |
//! | `metadata`     | key (UTF-8)           | value (bytes)            |
//!
//! Block indices and pending sequence numbers are big-endian u64 so sled's
//! lexicographic order matches numeric order. Sequence numbers come from
//! `Db::generate_id`, which stays monotonic across restarts.
//!
//! ## Atomicity
//!
//! Each write spans several trees and runs as one sled multi-tree
//! transaction. Everything that can fail for reasons other than I/O
//! (serialization, scanning the pending queue) happens before the
//! transaction starts, so the closure only inserts and removes.

use std::collections::HashSet;
use std::path::Path;

use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use super::{decode, encode, Backend, DbError, DbResult};
use crate::config::{
    META_LATEST_BLOCK_INDEX, TREE_BLOCKS, TREE_METADATA, TREE_PENDING, TREE_RECORDS,
    TREE_SCHEMAS, TREE_TRANSACTIONS,
};
use crate::ledger::{HashBlock, Transaction};
use crate::schema::RecordSchema;
use crate::store::Record;

/// Result of one closure inside a sled multi-tree transaction.
type TxResult = ConflictableTransactionResult<(), DbError>;

fn tx_error(e: TransactionError<DbError>) -> DbError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => DbError::Sled(e),
    }
}

fn be_u64(bytes: &[u8]) -> DbResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::Corrupt("invalid u64 key".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}

// ---------------------------------------------------------------------------
// SledBackend
// ---------------------------------------------------------------------------

/// sled-backed [`Backend`].
///
/// Cloning is cheap and clones share the same database handle.
#[derive(Debug, Clone)]
pub struct SledBackend {
    db: Db,
    schemas: Tree,
    records: Tree,
    transactions: Tree,
    pending: Tree,
    blocks: Tree,
    metadata: Tree,
}

impl SledBackend {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        Ok(Self {
            schemas: db.open_tree(TREE_SCHEMAS)?,
            records: db.open_tree(TREE_RECORDS)?,
            transactions: db.open_tree(TREE_TRANSACTIONS)?,
            pending: db.open_tree(TREE_PENDING)?,
            blocks: db.open_tree(TREE_BLOCKS)?,
            metadata: db.open_tree(TREE_METADATA)?,
            db,
        })
    }

    /// Index of the latest committed block, if any.
    pub fn latest_block_index(&self) -> DbResult<Option<u64>> {
        match self.metadata.get(META_LATEST_BLOCK_INDEX)? {
            Some(bytes) => Ok(Some(be_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Block until all writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Stage a transaction alongside `table`/`key` in one atomic write.
    fn put_with_pending(
        &self,
        table: &Tree,
        key: &[u8],
        value: &[u8],
        tx: &Transaction,
    ) -> DbResult<()> {
        let tx_bytes = encode(tx)?;
        let seq = self.db.generate_id()?.to_be_bytes();

        (table, &self.transactions, &self.pending)
            .transaction(|(table, transactions, pending)| -> TxResult {
                table.insert(key, value)?;
                transactions.insert(tx.id.as_bytes(), &tx_bytes[..])?;
                pending.insert(&seq[..], tx.id.as_bytes())?;
                Ok(())
            })
            .map_err(tx_error)?;

        debug!(tx_id = %tx.id, "transaction staged");
        Ok(())
    }
}

impl Backend for SledBackend {
    fn load_schemas(&self) -> DbResult<Vec<RecordSchema>> {
        self.schemas
            .iter()
            .values()
            .map(|v| decode(&v?))
            .collect()
    }

    fn load_records(&self) -> DbResult<Vec<Record>> {
        self.records
            .iter()
            .values()
            .map(|v| decode(&v?))
            .collect()
    }

    fn load_blocks(&self) -> DbResult<Vec<HashBlock>> {
        let mut chain: Vec<HashBlock> = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let block: HashBlock = decode(&value)?;
            let expected = chain.len() as u64;
            if be_u64(&key)? != expected || block.index != expected {
                return Err(DbError::Corrupt(format!(
                    "expected block {expected}, found block {}",
                    block.index
                )));
            }
            chain.push(block);
        }
        Ok(chain)
    }

    fn load_pending(&self) -> DbResult<Vec<Transaction>> {
        let mut out = Vec::with_capacity(self.pending.len());
        for id in self.pending.iter().values() {
            let id = id?;
            let tx = self.transactions.get(&id)?.ok_or_else(|| {
                DbError::Corrupt(format!(
                    "pending transaction {} missing",
                    String::from_utf8_lossy(&id)
                ))
            })?;
            out.push(decode(&tx)?);
        }
        Ok(out)
    }

    fn load_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_schema(&self, schema: &RecordSchema, tx: &Transaction) -> DbResult<()> {
        let bytes = encode(schema)?;
        self.put_with_pending(&self.schemas, schema.name.as_bytes(), &bytes, tx)
    }

    fn put_record(&self, record: &Record, tx: &Transaction) -> DbResult<()> {
        let bytes = encode(record)?;
        self.put_with_pending(&self.records, record.id.as_bytes(), &bytes, tx)
    }

    fn put_genesis(&self, block: &HashBlock) -> DbResult<()> {
        if !block.is_genesis() || !self.blocks.is_empty() {
            return Err(DbError::Corrupt(format!(
                "cannot store block {} as genesis of a chain with {} blocks",
                block.index,
                self.blocks.len()
            )));
        }
        let key = block.index.to_be_bytes();
        let bytes = encode(block)?;

        (&self.blocks, &self.metadata)
            .transaction(|(blocks, metadata)| -> TxResult {
                blocks.insert(&key[..], &bytes[..])?;
                metadata.insert(META_LATEST_BLOCK_INDEX, &key[..])?;
                Ok(())
            })
            .map_err(tx_error)?;

        self.flush()
    }

    fn commit_block(&self, block: &HashBlock, linked: &[Record]) -> DbResult<()> {
        let key = block.index.to_be_bytes();
        let block_bytes = encode(block)?;

        let mut sealed_ids = HashSet::with_capacity(block.transactions.len());
        let mut tx_entries = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let stored = Transaction {
                block_index: Some(block.index),
                ..tx.clone()
            };
            sealed_ids.insert(tx.id.as_bytes().to_vec());
            tx_entries.push((tx.id.as_bytes().to_vec(), encode(&stored)?));
        }

        let record_entries = linked
            .iter()
            .map(|r| Ok((r.id.as_bytes().to_vec(), encode(r)?)))
            .collect::<DbResult<Vec<_>>>()?;

        let mut pending_keys = Vec::new();
        for entry in self.pending.iter() {
            let (seq, id) = entry?;
            if sealed_ids.contains(&id[..]) {
                pending_keys.push(seq);
            }
        }

        (
            &self.blocks,
            &self.transactions,
            &self.records,
            &self.pending,
            &self.metadata,
        )
            .transaction(|(blocks, transactions, records, pending, metadata)| -> TxResult {
                blocks.insert(&key[..], &block_bytes[..])?;
                for (id, bytes) in &tx_entries {
                    transactions.insert(&id[..], &bytes[..])?;
                }
                for (id, bytes) in &record_entries {
                    records.insert(&id[..], &bytes[..])?;
                }
                for seq in &pending_keys {
                    pending.remove(&seq[..])?;
                }
                metadata.insert(META_LATEST_BLOCK_INDEX, &key[..])?;
                Ok(())
            })
            .map_err(tx_error)?;

        self.flush()?;

        debug!(
            index = block.index,
            transactions = tx_entries.len(),
            records = record_entries.len(),
            "block committed"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::schema::{FieldKind, FieldSpec, Fields};
    use chrono::Utc;
    use serde_json::json;

    // -- Helpers ------------------------------------------------------------

    fn make_test_schema() -> RecordSchema {
        RecordSchema::new("User", vec![FieldSpec::new("name", FieldKind::Text)], "")
    }

    fn make_test_record(id: &str, name: &str) -> (Record, Transaction) {
        let fields: Fields = serde_json::from_value(json!({"name": name})).unwrap();
        let now = Utc::now();
        let tx = Transaction::record_created(id, "User", fields.clone(), now);
        let record = Record {
            id: id.into(),
            schema_name: "User".into(),
            fields,
            created_at: now,
            updated_at: now,
            ledger_transaction_id: Some(tx.id.clone()),
            ledger_block_index: None,
        };
        (record, tx)
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn open_temporary_database() {
        let db = SledBackend::open_temporary().expect("should create temp db");
        assert_eq!(db.block_count(), 0);
        assert_eq!(db.pending_count(), 0);
        assert!(db.load_blocks().unwrap().is_empty());
        assert!(db.latest_block_index().unwrap().is_none());
    }

    #[test]
    fn genesis_is_stored_once() {
        let db = SledBackend::open_temporary().unwrap();
        let genesis = HashBlock::genesis(0);
        db.put_genesis(&genesis).unwrap();
        assert_eq!(db.load_blocks().unwrap(), vec![genesis.clone()]);
        assert_eq!(db.latest_block_index().unwrap(), Some(0));

        assert!(matches!(db.put_genesis(&genesis), Err(DbError::Corrupt(_))));
    }

    #[test]
    fn schema_and_transaction_written_together() {
        let db = SledBackend::open_temporary().unwrap();
        let schema = make_test_schema();
        let tx = Transaction::schema_created(schema.clone());
        db.put_schema(&schema, &tx).unwrap();

        assert_eq!(db.load_schemas().unwrap(), vec![schema]);
        assert_eq!(db.load_pending().unwrap(), vec![tx.clone()]);
        assert_eq!(db.load_transaction(&tx.id).unwrap(), Some(tx));
    }

    #[test]
    fn pending_keeps_enqueue_order() {
        let db = SledBackend::open_temporary().unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let (record, tx) = make_test_record(&format!("r{i}"), "x");
            db.put_record(&record, &tx).unwrap();
            ids.push(tx.id);
        }
        let pending: Vec<_> = db.load_pending().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(pending, ids);
    }

    #[test]
    fn commit_block_links_and_clears_pending() {
        let db = SledBackend::open_temporary().unwrap();
        let mut ledger = Ledger::new(1);
        db.put_genesis(ledger.genesis()).unwrap();

        let (mut record, tx) = make_test_record("r1", "Ada");
        db.put_record(&record, &tx).unwrap();
        ledger.enqueue(tx.clone());

        let block = ledger.prepare_block().unwrap();
        record.ledger_block_index = Some(block.index);
        db.commit_block(&block, &[record.clone()]).unwrap();

        assert_eq!(db.pending_count(), 0);
        assert_eq!(db.latest_block_index().unwrap(), Some(1));
        assert_eq!(db.load_records().unwrap(), vec![record]);
        assert_eq!(
            db.load_transaction(&tx.id).unwrap().and_then(|t| t.block_index),
            Some(1)
        );
        let chain = db.load_blocks().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], block);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let schema = make_test_schema();
        let tx = Transaction::schema_created(schema.clone());
        {
            let db = SledBackend::open(dir.path()).expect("should open db");
            db.put_genesis(&HashBlock::genesis(0)).unwrap();
            db.put_schema(&schema, &tx).unwrap();
            db.flush().unwrap();
        }

        let db = SledBackend::open(dir.path()).expect("should reopen db");
        assert_eq!(db.load_schemas().unwrap(), vec![schema]);
        assert_eq!(db.load_pending().unwrap().len(), 1);
        assert_eq!(db.block_count(), 1);
    }

    #[test]
    fn gap_in_chain_is_corrupt() {
        let db = SledBackend::open_temporary().unwrap();
        db.put_genesis(&HashBlock::genesis(0)).unwrap();
        let orphan = HashBlock::seal(2, Vec::new(), 0, "x".into());
        db.blocks
            .insert(2u64.to_be_bytes().to_vec(), encode(&orphan).unwrap())
            .unwrap();

        assert!(matches!(db.load_blocks(), Err(DbError::Corrupt(_))));
    }

    #[test]
    fn dangling_pending_entry_is_corrupt() {
        let db = SledBackend::open_temporary().unwrap();
        db.pending
            .insert(1u64.to_be_bytes().to_vec(), "no-such-tx".as_bytes())
            .unwrap();
        assert!(matches!(db.load_pending(), Err(DbError::Corrupt(_))));
    }
}
