//! Unspent transaction outputs and the per-address UTXO index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use naka_types::{Address, TxHash};

use crate::error::LedgerError;
use crate::transaction::Transaction;

/// A single unspent output.
///
/// Two UTXOs are equal iff all four fields are equal. An output embedded
/// in a not-yet-realized transaction carries an empty `tx_hash`; the hash
/// is stamped when the transaction is applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: TxHash,
    pub index: i32,
    pub amount: i64,
    pub address: Address,
}

/// Map from address to that address's unspent outputs, in insertion order.
///
/// Invariant: the index always equals the fold of `apply_tx` over every
/// transaction in the current chain, starting from the initial seed. All
/// mutating operations fail atomically: an error leaves the index exactly
/// as it was.
#[derive(Clone, Debug, Default)]
pub struct UtxoIndex {
    utxos: HashMap<Address, Vec<Utxo>>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All outputs currently held by an address, in insertion order.
    pub fn utxos_for(&self, address: &Address) -> &[Utxo] {
        self.utxos.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total amount spendable by an address.
    pub fn balance(&self, address: &Address) -> i64 {
        self.utxos_for(address).iter().map(|u| u.amount).sum()
    }

    pub fn contains(&self, utxo: &Utxo) -> bool {
        self.utxos_for(&utxo.address).contains(utxo)
    }

    /// Append an output to its address's collection.
    pub fn add(&mut self, utxo: Utxo) {
        self.utxos.entry(utxo.address.clone()).or_default().push(utxo);
    }

    /// Remove the exact four-field tuple. Fails with `NotFound` when absent.
    pub fn remove(&mut self, utxo: &Utxo) -> Result<(), LedgerError> {
        let entries = self
            .utxos
            .get_mut(&utxo.address)
            .ok_or_else(|| LedgerError::NotFound(format!("utxo for {}", utxo.address)))?;
        let position = entries
            .iter()
            .position(|u| u == utxo)
            .ok_or_else(|| LedgerError::NotFound(format!("utxo {}:{}", utxo.tx_hash, utxo.index)))?;
        entries.remove(position);
        if entries.is_empty() {
            self.utxos.remove(&utxo.address);
        }
        Ok(())
    }

    /// A transaction is applicable when it self-verifies and every one of
    /// its inputs is present in the index.
    pub fn check_tx(&self, tx: &Transaction) -> bool {
        tx.verify() && tx.inputs.iter().all(|input| self.contains(input))
    }

    /// Spend the inputs and realize the outputs (stamped with the
    /// transaction hash).
    pub fn apply_tx(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        if !self.check_tx(tx) {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {} is not applicable",
                tx.hash
            )));
        }

        let mut spent = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            match self.remove(input) {
                Ok(()) => spent.push(input.clone()),
                Err(e) => {
                    // A duplicated input slips past check_tx; put the
                    // already-spent ones back before reporting.
                    for utxo in spent {
                        self.add(utxo);
                    }
                    return Err(e);
                }
            }
        }
        for index in 0..tx.outputs.len() {
            if let Some(utxo) = tx.output_utxo(index) {
                self.add(utxo);
            }
        }
        Ok(())
    }

    /// Inverse of [`apply_tx`]: remove the realized outputs, restore the
    /// inputs.
    pub fn revert_tx(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let mut removed = Vec::with_capacity(tx.outputs.len());
        for index in 0..tx.outputs.len() {
            let Some(utxo) = tx.output_utxo(index) else {
                continue;
            };
            match self.remove(&utxo) {
                Ok(()) => removed.push(utxo),
                Err(e) => {
                    for utxo in removed {
                        self.add(utxo);
                    }
                    return Err(e);
                }
            }
        }
        for input in &tx.inputs {
            self.add(input.clone());
        }
        Ok(())
    }

    /// Fold a block's transactions into the index, in order.
    pub fn apply_block(&mut self, block: &crate::block::Block) -> Result<(), LedgerError> {
        let mut applied: Vec<&Transaction> = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            match self.apply_tx(tx) {
                Ok(()) => applied.push(tx),
                Err(e) => {
                    for done in applied.iter().rev() {
                        if let Err(undo) = self.revert_tx(done) {
                            tracing::error!(error = %undo, "failed to undo partial block application");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Unfold a block's transactions, newest first.
    pub fn revert_block(&mut self, block: &crate::block::Block) -> Result<(), LedgerError> {
        let mut reverted: Vec<&Transaction> = Vec::with_capacity(block.transactions.len());
        for tx in block.transactions.iter().rev() {
            match self.revert_tx(tx) {
                Ok(()) => reverted.push(tx),
                Err(e) => {
                    for done in reverted.iter().rev() {
                        if let Err(undo) = self.apply_tx(done) {
                            tracing::error!(error = %undo, "failed to undo partial block revert");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Pick a prefix of an address's outputs whose sum covers `amount`.
    ///
    /// Selection order is the address's insertion order; ties are not
    /// broken further.
    pub fn select(&self, address: &Address, amount: i64) -> Result<Vec<Utxo>, LedgerError> {
        let available = self.balance(address);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available,
            });
        }

        let mut selected = Vec::new();
        let mut total = 0i64;
        for utxo in self.utxos_for(address) {
            if total >= amount {
                break;
            }
            total += utxo.amount;
            selected.push(utxo.clone());
        }
        Ok(selected)
    }
}
