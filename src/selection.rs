use crate::{
    DependencyGraph, OutputIndex, SignatureOracle, Tinycoin, Transaction, TransactionValidator,
    UtxoId, UtxoPool,
};
use std::collections::HashSet;

/// The batch acceptance path: given an unordered set of proposed transactions, accept
/// the mutually valid subset that maximizes the collected fee, and advance the owned
/// snapshot accordingly.
///
/// Candidates may depend on each other (one spends an output another produces within
/// the same batch), so acceptance is decided over the producer/consumer dependency
/// forest rather than per transaction.
pub struct TransactionSelector {
    confirmed: UtxoPool,
    oracle: Box<dyn SignatureOracle>,
}

impl TransactionSelector {
    pub fn new(confirmed: UtxoPool, oracle: Box<dyn SignatureOracle>) -> Self {
        Self { confirmed, oracle }
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.confirmed
    }

    /// Whether the transaction is acceptable against the current confirmed snapshot.
    pub fn is_valid(&self, transaction: &Transaction) -> bool {
        self.validator().is_valid(transaction)
    }

    /// The transaction's fee against the current confirmed snapshot, if valid.
    pub fn fee(&self, transaction: &Transaction) -> Option<Tinycoin> {
        self.validator().fee(transaction)
    }

    /// Accepts the fee-maximal mutually valid subset of `candidates` and commits it to
    /// the owned snapshot. Returns the accepted transactions in commit order:
    /// producers always precede the consumers that spend their outputs.
    pub fn select(&mut self, candidates: &[Transaction]) -> Vec<Transaction> {
        // Outputs produced within the batch itself. A candidate whose inputs resolve
        // only against these is well-formed but not standalone-valid.
        let overlay = Self::pending_overlay(candidates);

        // Candidates that fail even with the overlay enabled are malformed and take no
        // part in the forest. Repeats of an already-seen transaction are dropped as
        // well, so one id holds at most one node. The survivors get their stable node
        // ids here.
        let mut batch: Vec<&Transaction> = Vec::new();
        let mut fees: Vec<Tinycoin> = Vec::new();
        {
            let mut ids = HashSet::new();
            let validator =
                TransactionValidator::new(&self.confirmed, Some(&overlay), &*self.oracle);
            for candidate in candidates {
                if !ids.insert(*candidate.id()) {
                    continue;
                }
                if let Some(fee) = validator.fee(candidate) {
                    batch.push(candidate);
                    fees.push(fee);
                }
            }
        }

        let graph = self.build_graph(&batch, &fees);
        let order = graph.max_fee_forest();

        // Commit pass against the live snapshot, no overlay. Thanks to the dependency
        // ordering a consumer is only checked after its producer has been committed.
        // A residual collision the forest does not model (two trees spending the same
        // confirmed UTXO) surfaces here; the loser is dropped, not the whole batch.
        let mut accepted = Vec::new();
        for node in order {
            let transaction = batch[node];
            let fee = TransactionValidator::new(&self.confirmed, None, &*self.oracle)
                .fee(transaction);
            if fee.is_some() {
                self.confirmed.apply(transaction);
                accepted.push(transaction.clone());
            }
        }
        accepted
    }

    fn validator(&self) -> TransactionValidator<'_> {
        TransactionValidator::new(&self.confirmed, None, &*self.oracle)
    }

    fn pending_overlay(candidates: &[Transaction]) -> UtxoPool {
        let mut overlay = UtxoPool::new();
        for candidate in candidates {
            for (index, output) in candidate.outputs().iter().enumerate() {
                let utxo_id = UtxoId::new(*candidate.id(), OutputIndex::new(index as u32));
                // The same transaction may appear in the batch twice; its outputs are
                // identical, so the first copy wins.
                if !overlay.contains(&utxo_id) {
                    overlay.add(utxo_id, output.clone());
                }
            }
        }
        overlay
    }

    fn build_graph(&self, batch: &[&Transaction], fees: &[Tinycoin]) -> DependencyGraph {
        let mut graph = DependencyGraph::new(batch.len());

        let standalone = TransactionValidator::new(&self.confirmed, None, &*self.oracle);
        for (node, transaction) in batch.iter().enumerate() {
            graph.set_fee(node, fees[node]);
            if standalone.is_valid(transaction) {
                graph.mark_leaf(node);
            }
            for input in transaction.inputs() {
                if self.confirmed.contains(input.utxo_id()) {
                    graph.add_confirmed_input(node, *input.utxo_id());
                }
            }
        }

        for (consumer, consumer_tx) in batch.iter().enumerate() {
            for (producer, producer_tx) in batch.iter().enumerate() {
                if consumer == producer {
                    continue;
                }
                let consumed = Self::consumed_outputs(consumer_tx, producer_tx);
                if !consumed.is_empty() {
                    graph.add_edge(consumer, producer, consumed);
                }
            }
        }
        graph
    }

    /// The output indices of `producer` that `consumer` spends.
    fn consumed_outputs(consumer: &Transaction, producer: &Transaction) -> Vec<OutputIndex> {
        consumer
            .inputs()
            .iter()
            .filter(|input| input.utxo_id().transaction_id() == producer.id())
            .map(|input| *input.utxo_id().output_index())
            .collect()
    }
}
