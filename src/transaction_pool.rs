use crate::{Block, Transaction, TransactionId};
use std::collections::HashMap;

/// An unordered collection of transactions that have been relayed to this node but are
/// not yet included in any accepted block.
/// The pool is shared across branches: it is not tied to any particular tip, and its
/// entries persist until some accepted block includes them.
pub struct TransactionPool {
    transactions: HashMap<TransactionId, Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            transactions: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn contains(&self, transaction_id: &TransactionId) -> bool {
        self.transactions.contains_key(transaction_id)
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.transactions.values().map(|t| t.clone()).collect()
    }

    /// Ensures that the transaction exists in the pool.
    /// No validity check happens here; validity is decided at selection or commit time
    /// against whichever snapshot is in use.
    pub fn insert(&mut self, transaction: Transaction) {
        self.transactions.insert(*transaction.id(), transaction);
    }

    /// Drops every transaction that the accepted block confirmed.
    pub fn remove_confirmed(&mut self, block: &Block) {
        for transaction in block.transactions() {
            self.transactions.remove(transaction.id());
            // The transaction may not exist, e.g. because the node heard about the
            // block before it heard about the transaction.
        }
    }
}
