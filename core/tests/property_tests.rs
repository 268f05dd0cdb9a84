//! Property-based tests for ledger and validator invariants
//!
//! - Chain integrity: any sequence of mines validates
//! - Proof-of-work: every sealed block meets difficulty and recomputes
//! - Pending lifecycle: a mined block holds exactly the enqueued batch, in order
//! - Tamper evidence: changing any sealed payload breaks validation
//! - Validation is deterministic and never rejects well-typed input

use chainstore_core::config::StoreConfig;
use chainstore_core::ledger::{Ledger, Transaction, TransactionPayload};
use chainstore_core::schema::{
    validate_record, FieldKind, FieldSpec, FieldValue, Fields, RecordSchema, ValidationError,
};
use chrono::Utc;
use proptest::prelude::*;

/// Strategy for small text/integer field maps
fn fields_strategy() -> impl Strategy<Value = Fields> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop_oneof![
            any::<i64>().prop_map(FieldValue::Integer),
            "[a-zA-Z0-9 ]{0,16}".prop_map(FieldValue::Text),
            any::<bool>().prop_map(FieldValue::Boolean),
        ],
        0..5,
    )
}

/// Strategy for a record-created transaction
fn tx_strategy() -> impl Strategy<Value = Transaction> {
    ("[a-z0-9]{8}", fields_strategy())
        .prop_map(|(id, fields)| Transaction::record_created(id, "Item", fields, Utc::now()))
}

/// Strategy for a list of batches, one per block
fn batches_strategy() -> impl Strategy<Value = Vec<Vec<Transaction>>> {
    prop::collection::vec(prop::collection::vec(tx_strategy(), 1..5), 1..5)
}

fn mine_batches(batches: &[Vec<Transaction>], difficulty: u32) -> Ledger {
    let mut ledger = Ledger::with_config(&StoreConfig::with_difficulty(difficulty));
    for batch in batches {
        for tx in batch {
            ledger.enqueue(tx.clone());
        }
        ledger.mine().expect("pending work present");
    }
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn mined_chains_always_validate(batches in batches_strategy(), difficulty in 0u32..=2) {
        let ledger = mine_batches(&batches, difficulty);
        prop_assert!(ledger.validate());
        prop_assert!(ledger.audit().is_valid());
        prop_assert_eq!(ledger.len(), batches.len() + 1);
    }

    #[test]
    fn sealed_blocks_meet_difficulty(batches in batches_strategy(), difficulty in 0u32..=2) {
        let ledger = mine_batches(&batches, difficulty);
        let zeros = "0".repeat(difficulty as usize);
        for block in &ledger.chain()[1..] {
            prop_assert!(block.hash.starts_with(&zeros));
            prop_assert_eq!(block.recompute_hash(), block.hash.clone());
        }
    }

    #[test]
    fn blocks_hold_batches_in_enqueue_order(batches in batches_strategy()) {
        let ledger = mine_batches(&batches, 1);
        prop_assert!(ledger.pending().is_empty());
        for (block, batch) in ledger.chain()[1..].iter().zip(&batches) {
            let sealed: Vec<_> = block.transactions.iter().map(|t| t.id.clone()).collect();
            let enqueued: Vec<_> = batch.iter().map(|t| t.id.clone()).collect();
            prop_assert_eq!(sealed, enqueued);
        }
    }

    #[test]
    fn any_payload_change_is_detected(
        batches in batches_strategy(),
        pick in any::<prop::sample::Index>(),
        value in any::<i64>(),
    ) {
        let ledger = mine_batches(&batches, 1);
        let mut chain = ledger.chain().to_vec();

        let positions: Vec<(usize, usize)> = chain
            .iter()
            .enumerate()
            .skip(1)
            .flat_map(|(b, block)| (0..block.transactions.len()).map(move |t| (b, t)))
            .collect();
        let (b, t) = positions[pick.index(positions.len())];

        let payload = &mut chain[b].transactions[t].payload;
        if let TransactionPayload::RecordCreated { fields, .. } = payload {
            let key = "__tampered".to_string();
            fields.insert(key, FieldValue::Integer(value));
        }

        let tampered = Ledger::from_parts(chain, Vec::new(), &StoreConfig::with_difficulty(1));
        prop_assert!(!tampered.validate());
        prop_assert_eq!(tampered.audit().first_fault(), Some(b as u64));
    }

    #[test]
    fn validation_is_deterministic(name in "[a-z]{0,8}", age in prop::option::of(any::<i64>())) {
        let schema = RecordSchema::new(
            "User",
            vec![
                FieldSpec::new("name", FieldKind::Text),
                FieldSpec::new("age", FieldKind::Integer),
                FieldSpec::new("active", FieldKind::Boolean).with_default(true),
            ],
            "",
        );
        let mut input = Fields::new();
        input.insert("name".into(), FieldValue::Text(name));
        if let Some(age) = age {
            input.insert("age".into(), FieldValue::Integer(age));
        }

        let first = validate_record(&schema, &input);
        let second = validate_record(&schema, &input);
        prop_assert_eq!(first.clone(), second);

        match (age, first) {
            (Some(_), Ok(out)) => {
                prop_assert_eq!(out.get("active"), Some(&FieldValue::Boolean(true)))
            }
            (None, Err(ValidationError::MissingRequiredField(field))) => {
                prop_assert_eq!(field, "age")
            }
            (age, other) => prop_assert!(false, "age={:?} gave {:?}", age, other),
        }
    }
}
