//! The pending-transaction pool.
//!
//! Keyed by transaction hash, disjoint from the chain: a transaction moves
//! out when it is mined and may move back in when a reorg orphans its
//! block.

use std::collections::HashMap;

use naka_types::TxHash;

use crate::block::Block;
use crate::chain::Chain;
use crate::error::LedgerError;
use crate::transaction::Transaction;
use crate::utxo::UtxoIndex;

#[derive(Clone, Debug, Default)]
pub struct Mempool {
    transactions: HashMap<TxHash, Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn get(&self, hash: &TxHash) -> Option<&Transaction> {
        self.transactions.get(hash)
    }

    pub fn add(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        if self.transactions.contains_key(&tx.hash) {
            return Err(LedgerError::DuplicateTransaction(tx.hash));
        }
        self.transactions.insert(tx.hash.clone(), tx);
        Ok(())
    }

    pub fn remove(&mut self, hash: &TxHash) -> Result<Transaction, LedgerError> {
        self.transactions
            .remove(hash)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {hash} not in pool")))
    }

    /// Drop a transaction if present; used when a mined block lands.
    pub fn discard(&mut self, hash: &TxHash) {
        self.transactions.remove(hash);
    }

    /// Up to `n` pooled transactions that are currently applicable against
    /// the given UTXO index. Iteration order is the map's own; it is
    /// consistent within a process but not across nodes.
    pub fn select_up_to(&self, n: usize, utxo_index: &UtxoIndex) -> Vec<Transaction> {
        let mut selected = Vec::with_capacity(n.min(self.transactions.len()));
        for tx in self.transactions.values() {
            if selected.len() >= n {
                break;
            }
            if utxo_index.check_tx(tx) {
                selected.push(tx.clone());
            }
        }
        selected
    }

    /// Return transactions from rolled-back blocks to the pool, skipping
    /// any that the (post-reorg) chain already contains.
    pub fn readmit_stale(&mut self, removed_blocks: &[Block], chain: &Chain) {
        for block in removed_blocks {
            for tx in &block.transactions {
                if chain.has_tx(&tx.hash) || self.contains(&tx.hash) {
                    continue;
                }
                tracing::debug!(hash = %tx.hash, "readmitting orphaned transaction");
                self.transactions.insert(tx.hash.clone(), tx.clone());
            }
        }
    }
}
