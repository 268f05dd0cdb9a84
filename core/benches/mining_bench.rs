// Ledger benchmarks for chainstore.
//
// Covers block hashing over growing batches, proof-of-work at small
// difficulties, and full-chain validation.

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chainstore_core::config::StoreConfig;
use chainstore_core::ledger::{compute_hash, HashBlock, Ledger, ProofOfWork, Transaction};
use chainstore_core::schema::Fields;

fn make_batch(n: usize) -> Vec<Transaction> {
    (0..n)
        .map(|i| {
            let mut fields = Fields::new();
            fields.insert("name".into(), format!("item-{i}").into());
            fields.insert("qty".into(), (i as i64).into());
            Transaction::record_created(format!("rec-{i}"), "Item", fields, Utc::now())
        })
        .collect()
}

fn bench_block_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/block_hash");
    for n in [1usize, 10, 100] {
        let txs = make_batch(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &txs, |b, txs| {
            b.iter(|| compute_hash(1, txs, 1_700_000_000_000, "00ab", 42));
        });
    }
    group.finish();
}

fn bench_proof_of_work(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/proof_of_work");
    group.sample_size(20);
    let block = HashBlock::seal(1, make_batch(10), 1_700_000_000_000, "00ab".into());
    for difficulty in [1u32, 2, 3] {
        let pow = ProofOfWork::new(difficulty);
        group.bench_with_input(BenchmarkId::from_parameter(difficulty), &pow, |b, pow| {
            b.iter(|| pow.solve(&block));
        });
    }
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut ledger = Ledger::with_config(&StoreConfig::with_difficulty(1));
    for _ in 0..50 {
        for tx in make_batch(5) {
            ledger.enqueue(tx);
        }
        let _ = ledger.mine();
    }

    c.bench_function("ledger/validate_50_blocks", |b| {
        b.iter(|| ledger.validate());
    });
}

criterion_group!(benches, bench_block_hash, bench_proof_of_work, bench_validate);
criterion_main!(benches);
