//! End-to-end tests for the record store over the sled backend.
//!
//! Each test opens its own temporary database or tempdir. They cover the
//! full path: schema definition, record mutation, mining, reopen, and the
//! tamper checks run against what was persisted.

use serde_json::json;

use chainstore_core::config::StoreConfig;
use chainstore_core::ledger::{ChainFault, Ledger, TransactionKind, TransactionPayload};
use chainstore_core::schema::{FieldKind, FieldSpec, FieldValue, Fields};
use chainstore_core::storage::{Backend, SledBackend};
use chainstore_core::store::{RecordStore, StoreError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn fields(value: serde_json::Value) -> Fields {
    serde_json::from_value(value).expect("fields object")
}

fn product_schema() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", FieldKind::Text),
        FieldSpec::new("price", FieldKind::Real),
        FieldSpec::new("stock", FieldKind::Integer).with_default(0i64),
        FieldSpec::new("listed_at", FieldKind::Timestamp).optional(),
        FieldSpec::new("attributes", FieldKind::Json).optional(),
    ]
}

fn open_temp_store() -> RecordStore<SledBackend> {
    let backend = SledBackend::open_temporary().expect("temp db");
    RecordStore::open(backend, StoreConfig::with_difficulty(1)).expect("open store")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_on_sled() {
    let mut store = open_temp_store();
    store
        .define_schema("Product", product_schema(), "catalog")
        .expect("define schema");

    let lamp = store
        .create(
            "Product",
            fields(json!({
                "name": "Lamp",
                "price": 19.99,
                "listed_at": "2026-05-01T09:00:00Z",
                "attributes": {"color": "red"}
            })),
        )
        .expect("create lamp");
    let desk = store
        .create("Product", fields(json!({"name": "Desk", "price": 120})))
        .expect("create desk");

    let block1 = store.mine().expect("mine block 1");
    assert_eq!(block1.index, 1);
    assert_eq!(block1.transactions.len(), 3);
    assert!(block1.hash.starts_with('0'));

    store
        .update(&desk, fields(json!({"name": "Desk", "price": 99.5, "stock": 4})))
        .expect("update desk");
    let block2 = store.mine().expect("mine block 2");
    assert_eq!(block2.previous_hash, block1.hash);

    assert_eq!(store.get(&lamp).unwrap().ledger_block_index, Some(1));
    assert_eq!(store.get(&desk).unwrap().ledger_block_index, Some(2));
    assert_eq!(store.get(&desk).unwrap().fields["stock"], FieldValue::Integer(4));
    assert_eq!(store.get(&lamp).unwrap().fields["stock"], FieldValue::Integer(0));
    assert!(store.validate_chain());

    let history = store.history(&desk);
    assert_eq!(
        history.iter().map(|t| t.kind()).collect::<Vec<_>>(),
        vec![TransactionKind::RecordCreated, TransactionKind::RecordUpdated]
    );
    assert_eq!(history[1].block_index, Some(2));
}

#[test]
fn reopen_restores_schemas_records_chain_and_pending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (sealed_id, pending_id, chain) = {
        let backend = SledBackend::open(dir.path()).expect("open db");
        let mut store = RecordStore::open(backend, StoreConfig::with_difficulty(1)).unwrap();
        store.define_schema("Product", product_schema(), "").unwrap();
        let sealed = store
            .create("Product", fields(json!({"name": "Lamp", "price": 10})))
            .unwrap();
        store.mine().unwrap();
        let pending = store
            .create("Product", fields(json!({"name": "Desk", "price": 20})))
            .unwrap();
        (sealed, pending, store.ledger().chain().to_vec())
    };

    let backend = SledBackend::open(dir.path()).expect("reopen db");
    let mut store = RecordStore::open(backend, StoreConfig::with_difficulty(1)).unwrap();

    assert!(store.schema("Product").is_some());
    assert_eq!(store.ledger().chain(), &chain[..]);
    assert_eq!(store.ledger().pending().len(), 1);
    assert_eq!(store.get(&sealed_id).unwrap().ledger_block_index, Some(1));
    assert_eq!(store.get(&pending_id).unwrap().ledger_block_index, None);
    assert!(store.validate_chain());

    // Recovered pending work is mined like any other.
    let block = store.mine().unwrap();
    assert_eq!(block.index, 2);
    assert_eq!(store.get(&pending_id).unwrap().ledger_block_index, Some(2));
    assert_eq!(store.backend().pending_count(), 0);
}

#[test]
fn stored_transactions_carry_block_index() {
    let mut store = open_temp_store();
    store.define_schema("Product", product_schema(), "").unwrap();
    let pending_tx = store.ledger().pending()[0].id.clone();

    assert_eq!(store.transaction(&pending_tx).unwrap().unwrap().block_index, None);
    store.mine().unwrap();
    let stored = store.transaction(&pending_tx).unwrap().unwrap();
    assert_eq!(stored.block_index, Some(1));
    assert!(matches!(stored.payload, TransactionPayload::SchemaCreated { .. }));

    // The copy inside the block stays unlinked.
    assert_eq!(store.ledger().block(1).unwrap().transactions[0].block_index, None);
}

#[test]
fn validation_errors_surface_through_the_store() {
    let mut store = open_temp_store();
    store.define_schema("Product", product_schema(), "").unwrap();

    let cases = [
        json!({"name": "Lamp"}),
        json!({"name": "Lamp", "price": "cheap"}),
        json!({"name": "Lamp", "price": 1, "stock": 1.5}),
        json!({"name": "Lamp", "price": 1, "stock": u64::MAX}),
        json!({"name": "Lamp", "price": 1, "listed_at": null}),
        json!({"name": "Lamp", "price": 1, "listed_at": "soon"}),
        json!({"name": "Lamp", "price": 1, "attributes": "red"}),
    ];
    for input in cases {
        let err = store.create("Product", fields(input.clone())).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{input} -> {err}");
    }
    assert_eq!(store.ledger().pending().len(), 1);
    assert_eq!(store.record_count(), 0);
}

#[test]
fn export_round_trips_through_json() {
    let mut store = open_temp_store();
    store.define_schema("Product", product_schema(), "").unwrap();
    store
        .create("Product", fields(json!({"name": "Lamp", "price": 10})))
        .unwrap();
    store.mine().unwrap();

    let snapshot = store.export();
    let text = snapshot.to_json_pretty().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(doc["schemas"][0]["name"], json!("Product"));
    assert_eq!(doc["records"][0]["fields"]["name"], json!("Lamp"));
    assert_eq!(doc["ledger"]["chain"].as_array().unwrap().len(), 2);
    assert_eq!(doc["ledger"]["pending_count"], json!(0));
    assert_eq!(doc["ledger"]["is_valid"], json!(true));
}

// ---------------------------------------------------------------------------
// Tamper detection
// ---------------------------------------------------------------------------

#[test]
fn tampered_persisted_chain_is_detected() {
    let mut store = open_temp_store();
    store.define_schema("Product", product_schema(), "").unwrap();
    store
        .create("Product", fields(json!({"name": "Lamp", "price": 10})))
        .unwrap();
    store.mine().unwrap();
    store
        .create("Product", fields(json!({"name": "Desk", "price": 20})))
        .unwrap();
    store.mine().unwrap();

    let mut chain = store.backend().load_blocks().unwrap();
    let payload = &mut chain[1].transactions[1].payload;
    if let TransactionPayload::RecordCreated { fields, .. } = payload {
        fields.insert("price".into(), FieldValue::Integer(1));
    } else {
        panic!("expected a record creation in block 1");
    }

    let ledger = Ledger::from_parts(chain, Vec::new(), &StoreConfig::with_difficulty(1));
    assert!(!ledger.validate());
    let audit = ledger.audit();
    assert_eq!(audit.faults.len(), 1);
    assert!(matches!(audit.faults[0], ChainFault::HashMismatch { index: 1, .. }));
}
