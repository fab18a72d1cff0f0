use crate::{SignatureOracle, Tinycoin, Transaction, TransactionOutput, UtxoId, UtxoPool};
use std::collections::HashSet;

/// Decides whether one transaction is acceptable against a ledger snapshot.
///
/// The overlay, when present, extends the lookup of referenced outputs with outputs
/// produced by not-yet-confirmed sibling candidates of the same batch. Confirmed
/// entries win over overlay entries on lookup.
///
/// Invalidity of untrusted input is a routine outcome: every check failure turns into
/// a `None`/`false` result, never a panic.
pub struct TransactionValidator<'a> {
    confirmed: &'a UtxoPool,
    overlay: Option<&'a UtxoPool>,
    oracle: &'a dyn SignatureOracle,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(
        confirmed: &'a UtxoPool,
        overlay: Option<&'a UtxoPool>,
        oracle: &'a dyn SignatureOracle,
    ) -> Self {
        Self {
            confirmed,
            overlay,
            oracle,
        }
    }

    pub fn is_valid(&self, transaction: &Transaction) -> bool {
        self.fee(transaction).is_some()
    }

    /// Runs all validity checks and returns the transaction's fee on success:
    ///   (1) every referenced UTXO exists in the snapshot (or the overlay, if enabled),
    ///   (2) every input's signature verifies over that input's signing payload,
    ///   (3) no UTXO is referenced by two inputs of this transaction,
    ///   (4) every output amount is non-negative,
    ///   (5) total input value covers total output value.
    /// The fee is the input surplus, which check (5) guarantees is non-negative.
    pub fn fee(&self, transaction: &Transaction) -> Option<Tinycoin> {
        let mut balance = Tinycoin::zero();
        let mut referenced = HashSet::new();

        for (index, input) in transaction.inputs().iter().enumerate() {
            let utxo_id = input.utxo_id();
            let output = match self.lookup(utxo_id) {
                Some(output) => output,
                None => return None, // condition (1)
            };

            let payload = transaction.signing_payload(index);
            if !self.oracle.verify(output.to(), &payload, input.signature()) {
                return None; // condition (2)
            }

            if !referenced.insert(*utxo_id) {
                return None; // condition (3)
            }

            balance = balance + output.amount();
        }

        for output in transaction.outputs() {
            if output.amount().is_negative() {
                return None; // condition (4)
            }
            balance = balance - output.amount();
        }

        if balance.is_negative() {
            return None; // condition (5)
        }

        Some(balance)
    }

    fn lookup(&self, utxo_id: &UtxoId) -> Option<&TransactionOutput> {
        self.confirmed
            .output(utxo_id)
            .or_else(|| self.overlay.and_then(|overlay| overlay.output(utxo_id)))
    }
}
