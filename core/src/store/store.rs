//! # RecordStore
//!
//! The store owns the schema registry, the records, and the [`Ledger`].
//! Every mutation follows the same pipeline:
//!
//! ```text
//! 1. CHECK     lookup + schema validation         (may fail, nothing changed)
//! 2. PERSIST   backend write of entity + tx        (may fail, nothing changed)
//! 3. ENQUEUE   ledger.enqueue(tx)                  (cannot fail)
//! ```
//!
//! Mining follows a similar shape:
//!
//! ```text
//! 1. PREPARE   ledger.prepare_block()              proof-of-work, chain untouched
//! 2. COMMIT    backend.commit_block(block, linked) block + linkage, one atomic write
//! 3. APPEND    ledger.append_sealed(block)         pending cleared
//! 4. LINK      link_block(tx, index) per tx        in-memory records updated
//! ```
//!
//! If COMMIT fails the error is returned and memory is exactly as before:
//! the transactions are still pending and the records still unlinked.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::export::{LedgerSnapshot, Snapshot};
use super::record::Record;
use crate::config::StoreConfig;
use crate::ledger::{ChainAudit, HashBlock, Ledger, LedgerInfo, RecordId, Transaction};
use crate::schema::{
    undeclared_fields, validate_definition, validate_record, FieldSpec, Fields, RecordSchema,
};
use crate::storage::Backend;

/// Store-wide status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub schema_count: usize,
    pub record_count: usize,
    pub ledger: LedgerInfo,
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Undeclared fields are stored as given; say so in the log.
fn warn_undeclared(schema: &RecordSchema, fields: &Fields) {
    let extra = undeclared_fields(schema, fields);
    if !extra.is_empty() {
        warn!(schema = %schema.name, fields = ?extra, "storing fields the schema does not declare");
    }
}

/// Schema-validated, ledger-backed record store.
///
/// All methods run to completion on the calling thread. Wrap the store in
/// a mutex to share it.
#[derive(Debug)]
pub struct RecordStore<B: Backend> {
    backend: B,
    schemas: BTreeMap<String, RecordSchema>,
    records: HashMap<RecordId, Record>,
    ledger: Ledger,
}

impl<B: Backend> RecordStore<B> {
    /// Load everything `backend` holds. A backend with no chain gets a
    /// genesis block written before this returns.
    pub fn open(backend: B, config: StoreConfig) -> StoreResult<Self> {
        let schemas = backend
            .load_schemas()?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect::<BTreeMap<_, _>>();
        let records = backend
            .load_records()?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<HashMap<_, _>>();

        let mut chain = backend.load_blocks()?;
        if chain.is_empty() {
            let genesis = HashBlock::genesis(Utc::now().timestamp_millis());
            backend.put_genesis(&genesis)?;
            debug!(hash = %genesis.hash, "genesis block written");
            chain.push(genesis);
        }
        let pending = backend.load_pending()?;
        let ledger = Ledger::from_parts(chain, pending, &config);

        info!(
            schemas = schemas.len(),
            records = records.len(),
            chain_length = ledger.len(),
            pending = ledger.pending().len(),
            difficulty = ledger.difficulty(),
            "record store opened"
        );

        let store = Self {
            backend,
            schemas,
            records,
            ledger,
        };
        if !store.ledger.validate() {
            let audit = store.ledger.audit();
            warn!(faults = audit.faults.len(), "store opened with a damaged chain");
        }
        Ok(store)
    }

    // -- Schemas ------------------------------------------------------------

    /// Register a new schema and queue its `SchemaCreated` transaction.
    pub fn define_schema(
        &mut self,
        name: &str,
        fields: Vec<FieldSpec>,
        description: &str,
    ) -> StoreResult<RecordSchema> {
        if self.schemas.contains_key(name) {
            return Err(StoreError::DuplicateSchema(name.to_string()));
        }
        validate_definition(name, &fields)?;

        let schema = RecordSchema::new(name, fields, description);
        let tx = Transaction::schema_created(schema.clone());
        self.backend.put_schema(&schema, &tx)?;

        info!(schema = name, fields = schema.fields.len(), tx_id = %tx.id, "schema defined");
        self.schemas.insert(schema.name.clone(), schema.clone());
        self.ledger.enqueue(tx);
        Ok(schema)
    }

    pub fn schema(&self, name: &str) -> Option<&RecordSchema> {
        self.schemas.get(name)
    }

    /// All schemas, ordered by name.
    pub fn schemas(&self) -> Vec<&RecordSchema> {
        self.schemas.values().collect()
    }

    // -- Records ------------------------------------------------------------

    /// Validate `fields` against `schema_name` and store a new record.
    pub fn create(&mut self, schema_name: &str, fields: Fields) -> StoreResult<RecordId> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| StoreError::UnknownSchema(schema_name.to_string()))?;
        let validated = validate_record(schema, &fields)?;
        warn_undeclared(schema, &fields);

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let tx = Transaction::record_created(id.clone(), schema_name, validated.clone(), now);
        let record = Record {
            id: id.clone(),
            schema_name: schema_name.to_string(),
            fields: validated,
            created_at: now,
            updated_at: now,
            ledger_transaction_id: Some(tx.id.clone()),
            ledger_block_index: None,
        };
        self.backend.put_record(&record, &tx)?;

        debug!(record_id = %id, schema = schema_name, tx_id = %tx.id, "record created");
        self.records.insert(id.clone(), record);
        self.ledger.enqueue(tx);
        Ok(id)
    }

    /// Replace a record's fields after validating the complete new mapping.
    pub fn update(&mut self, record_id: &str, fields: Fields) -> StoreResult<()> {
        let record = self
            .records
            .get(record_id)
            .ok_or_else(|| StoreError::UnknownRecord(record_id.to_string()))?;
        let schema = self
            .schemas
            .get(&record.schema_name)
            .ok_or_else(|| StoreError::UnknownSchema(record.schema_name.clone()))?;
        let validated = validate_record(schema, &fields)?;
        warn_undeclared(schema, &fields);

        let now = Utc::now();
        let tx = Transaction::record_updated(
            record_id,
            record.schema_name.clone(),
            record.fields.clone(),
            validated.clone(),
            now,
        );
        let updated = Record {
            fields: validated,
            updated_at: now,
            ledger_transaction_id: Some(tx.id.clone()),
            ledger_block_index: None,
            ..record.clone()
        };
        self.backend.put_record(&updated, &tx)?;

        debug!(record_id, tx_id = %tx.id, "record updated");
        self.records.insert(updated.id.clone(), updated);
        self.ledger.enqueue(tx);
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> Option<&Record> {
        self.records.get(record_id)
    }

    /// Records in creation order, optionally restricted to one schema.
    pub fn list(&self, schema_name: Option<&str>) -> Vec<&Record> {
        let mut out: Vec<&Record> = self
            .records
            .values()
            .filter(|r| schema_name.map_or(true, |s| r.schema_name == s))
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Records whose fields equal every criterion. Full scan, no index.
    pub fn search(&self, schema_name: Option<&str>, criteria: &Fields) -> Vec<&Record> {
        self.list(schema_name)
            .into_iter()
            .filter(|r| r.matches(criteria))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    // -- Ledger -------------------------------------------------------------

    /// Point the record last touched by `transaction_id` at `block_index`.
    /// Returns the record's id, or `None` if no record carries that
    /// transaction (schema transactions, or records updated since).
    pub fn link_block(&mut self, transaction_id: &str, block_index: u64) -> Option<RecordId> {
        let record = self
            .records
            .values_mut()
            .find(|r| r.ledger_transaction_id.as_deref() == Some(transaction_id))?;
        record.ledger_block_index = Some(block_index);
        Some(record.id.clone())
    }

    /// Seal every pending transaction into a new block.
    pub fn mine(&mut self) -> StoreResult<HashBlock> {
        let block = self.ledger.prepare_block()?;

        let by_tx: HashMap<&str, &Record> = self
            .records
            .values()
            .filter_map(|r| r.ledger_transaction_id.as_deref().map(|tx| (tx, r)))
            .collect();
        let linked: Vec<Record> = block
            .transactions
            .iter()
            .filter_map(|tx| by_tx.get(tx.id.as_str()))
            .map(|r| Record {
                ledger_block_index: Some(block.index),
                ..(*r).clone()
            })
            .collect();

        self.backend.commit_block(&block, &linked)?;
        self.ledger.append_sealed(block.clone())?;

        let linked_count = block
            .transactions
            .iter()
            .filter_map(|tx| self.link_block(&tx.id, block.index))
            .count();

        info!(
            index = block.index,
            transactions = block.transactions.len(),
            records_linked = linked_count,
            "block committed"
        );
        Ok(block)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn validate_chain(&self) -> bool {
        self.ledger.validate()
    }

    pub fn audit(&self) -> ChainAudit {
        self.ledger.audit()
    }

    /// Stored copy of a transaction, including its block index once sealed.
    pub fn transaction(&self, id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.backend.load_transaction(id)?)
    }

    /// Every transaction that touched `record_id`: sealed ones first in
    /// chain order with their block index set, then pending ones.
    pub fn history(&self, record_id: &str) -> Vec<Transaction> {
        let touches = |tx: &&Transaction| tx.payload.record_id() == Some(record_id);

        let sealed = self.ledger.chain().iter().flat_map(|block| {
            block.transactions.iter().filter(touches).map(move |tx| Transaction {
                block_index: Some(block.index),
                ..tx.clone()
            })
        });
        let pending = self.ledger.pending().iter().filter(touches).cloned();
        sealed.chain(pending).collect()
    }

    pub fn info(&self) -> StoreInfo {
        StoreInfo {
            schema_count: self.schemas.len(),
            record_count: self.records.len(),
            ledger: self.ledger.info(),
        }
    }

    /// Everything in the store as one document.
    pub fn export(&self) -> Snapshot {
        Snapshot {
            schemas: self.schemas.values().cloned().collect(),
            records: self.list(None).into_iter().cloned().collect(),
            ledger: LedgerSnapshot {
                chain: self.ledger.chain().to_vec(),
                pending_count: self.ledger.pending().len(),
                difficulty: self.ledger.difficulty(),
                is_valid: self.ledger.validate(),
            },
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
