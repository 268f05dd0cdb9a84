//! In-memory [`Backend`] for tests and throwaway stores.
//!
//! Clones share the same tables, so a store can be "reopened" over a clone
//! to exercise the load path without touching disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Backend, DbError, DbResult};
use crate::ledger::{HashBlock, Transaction, TransactionId};
use crate::schema::RecordSchema;
use crate::store::Record;

#[derive(Debug, Default)]
struct Tables {
    schemas: BTreeMap<String, RecordSchema>,
    records: BTreeMap<String, Record>,
    transactions: BTreeMap<TransactionId, Transaction>,
    pending: Vec<TransactionId>,
    blocks: Vec<HashBlock>,
}

/// Volatile backend. Every call takes the write lock once, which makes each
/// call atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.tables.read().blocks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.tables.read().pending.len()
    }
}

impl Backend for MemoryBackend {
    fn load_schemas(&self) -> DbResult<Vec<RecordSchema>> {
        Ok(self.tables.read().schemas.values().cloned().collect())
    }

    fn load_records(&self) -> DbResult<Vec<Record>> {
        Ok(self.tables.read().records.values().cloned().collect())
    }

    fn load_blocks(&self) -> DbResult<Vec<HashBlock>> {
        Ok(self.tables.read().blocks.clone())
    }

    fn load_pending(&self) -> DbResult<Vec<Transaction>> {
        let tables = self.tables.read();
        tables
            .pending
            .iter()
            .map(|id| {
                tables
                    .transactions
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DbError::Corrupt(format!("pending transaction {id} missing")))
            })
            .collect()
    }

    fn load_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        Ok(self.tables.read().transactions.get(id).cloned())
    }

    fn put_schema(&self, schema: &RecordSchema, tx: &Transaction) -> DbResult<()> {
        let mut tables = self.tables.write();
        tables.schemas.insert(schema.name.clone(), schema.clone());
        tables.transactions.insert(tx.id.clone(), tx.clone());
        tables.pending.push(tx.id.clone());
        Ok(())
    }

    fn put_record(&self, record: &Record, tx: &Transaction) -> DbResult<()> {
        let mut tables = self.tables.write();
        tables.records.insert(record.id.clone(), record.clone());
        tables.transactions.insert(tx.id.clone(), tx.clone());
        tables.pending.push(tx.id.clone());
        Ok(())
    }

    fn put_genesis(&self, block: &HashBlock) -> DbResult<()> {
        let mut tables = self.tables.write();
        if !block.is_genesis() || !tables.blocks.is_empty() {
            return Err(DbError::Corrupt(format!(
                "cannot store block {} as genesis of a chain with {} blocks",
                block.index,
                tables.blocks.len()
            )));
        }
        tables.blocks.push(block.clone());
        Ok(())
    }

    fn commit_block(&self, block: &HashBlock, linked: &[Record]) -> DbResult<()> {
        let mut tables = self.tables.write();
        if block.index != tables.blocks.len() as u64 {
            return Err(DbError::Corrupt(format!(
                "block {} does not follow block {}",
                block.index,
                tables.blocks.len().saturating_sub(1)
            )));
        }

        for tx in &block.transactions {
            let stored = Transaction {
                block_index: Some(block.index),
                ..tx.clone()
            };
            tables.transactions.insert(tx.id.clone(), stored);
        }
        for record in linked {
            tables.records.insert(record.id.clone(), record.clone());
        }
        tables
            .pending
            .retain(|id| !block.transactions.iter().any(|tx| &tx.id == id));
        tables.blocks.push(block.clone());
        Ok(())
    }
}
