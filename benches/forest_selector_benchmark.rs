use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tinycoin_lib::{
    Address, DigestSignatureScheme, OutputIndex, Signature, Tinycoin, Transaction,
    TransactionInput, TransactionOutput, TransactionSelector, UtxoId, UtxoPool,
};

const CHAIN_LENGTH: usize = 128;

/// Builds a batch where every candidate spends the previous candidate's output, so the
/// whole batch forms one dependency tree rooted at the last transaction.
fn dependent_chain(funding: &Transaction, length: usize) -> Vec<Transaction> {
    let scheme = DigestSignatureScheme::new();
    let mut candidates = Vec::with_capacity(length);
    let mut previous = funding.clone();
    let mut owner = Address::new("miner".to_string());
    let mut amount = funding.outputs()[0].amount();

    for i in 0..length {
        let next_owner = Address::new(format!("holder-{}", i));
        amount = amount - Tinycoin::new(1);
        let outputs = vec![TransactionOutput::new(next_owner.clone(), amount)];
        let source = UtxoId::new(*previous.id(), OutputIndex::new(0));

        let unsigned = Transaction::new(
            vec![TransactionInput::new(source, Signature::new(vec![]))],
            outputs.clone(),
        );
        let signature = scheme.sign(&owner, &unsigned.signing_payload(0));
        let transaction =
            Transaction::new(vec![TransactionInput::new(source, signature)], outputs);

        previous = transaction.clone();
        owner = next_owner;
        candidates.push(transaction);
    }
    candidates
}

fn select_chain_benchmark(c: &mut Criterion) {
    let funding = Transaction::new_coinbase(
        Address::new("miner".to_string()),
        Tinycoin::new(10 * CHAIN_LENGTH as i64),
    );
    let mut pool = UtxoPool::new();
    pool.apply(&funding);
    let candidates = dependent_chain(&funding, CHAIN_LENGTH);

    let mut group = c.benchmark_group("Forest selector");
    group.throughput(Throughput::Elements(CHAIN_LENGTH as u64));
    group.bench_function("select a 128-deep dependent chain", |b| {
        b.iter(|| {
            let mut selector =
                TransactionSelector::new(pool.clone(), Box::new(DigestSignatureScheme::new()));
            let accepted = selector.select(black_box(&candidates));
            assert_eq!(accepted.len(), CHAIN_LENGTH);
            black_box(accepted);
        })
    });
    group.finish();
}

criterion_group!(benches, select_chain_benchmark);

criterion_main!(benches);
