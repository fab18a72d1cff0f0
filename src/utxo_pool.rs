use crate::{OutputIndex, Transaction, TransactionOutput, UtxoId};
use std::collections::HashMap;

/// A snapshot of the confirmed and unspent transaction outputs at one point in the
/// chain.
/// Every branch tip owns its own copy, so mutating one branch never affects another.
/// A UTXO identity is never present twice; a violation of that is a defect in the
/// caller, not bad input, and fails an assertion.
#[derive(Debug, Clone)]
pub struct UtxoPool {
    // Unspent transaction outputs, indexed by their transaction ID and their index in the
    // transaction.
    utxos: HashMap<UtxoId, TransactionOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    pub fn contains(&self, utxo_id: &UtxoId) -> bool {
        self.utxos.contains_key(utxo_id)
    }

    pub fn output(&self, utxo_id: &UtxoId) -> Option<&TransactionOutput> {
        self.utxos.get(utxo_id)
    }

    pub fn add(&mut self, utxo_id: UtxoId, output: TransactionOutput) {
        let previous = self.utxos.insert(utxo_id, output);
        assert!(previous.is_none(), "duplicate UTXO in the pool: {}", utxo_id);
    }

    pub fn remove(&mut self, utxo_id: &UtxoId) {
        let previous = self.utxos.remove(utxo_id);
        assert!(previous.is_some(), "removing unknown UTXO: {}", utxo_id);
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Commits a transaction to the snapshot: consumes every input's UTXO and makes the
    /// transaction's own outputs spendable.
    ///
    /// Preconditions:
    ///   - The transaction has been validated against this snapshot (or has no inputs,
    ///     as coinbase and genesis transactions do).
    pub fn apply(&mut self, transaction: &Transaction) {
        for input in transaction.inputs() {
            self.remove(input.utxo_id());
        }
        for (index, output) in transaction.outputs().iter().enumerate() {
            let utxo_id = UtxoId::new(*transaction.id(), OutputIndex::new(index as u32));
            self.add(utxo_id, output.clone());
        }
    }
}
