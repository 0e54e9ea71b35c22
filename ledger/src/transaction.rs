//! Signed value-transfer transactions.
//!
//! A transaction spends a set of the sender's UTXOs into one payment
//! output, plus an optional change output back to the sender at index 1.
//! The hash is the canonical hash of the whole transaction with empty
//! `signature` and `hash` fields; the ECDSA signature covers that hash.
//! Once signed, a transaction is immutable.

use serde::{Deserialize, Serialize};

use naka_crypto::{derive_address, hash_value, sign_hash, verify_hash};
use naka_types::{unix_now_ms, PrivateKey, PublicKey, TxHash};

use crate::error::LedgerError;
use crate::utxo::Utxo;

/// Maximum number of outputs: the payment and, optionally, change.
const MAX_OUTPUTS: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
    pub timestamp: i64,
    pub signature: String,
    pub hash: TxHash,
    pub sender_pubkey: PublicKey,
}

impl Transaction {
    /// Build an unsigned transaction paying `amount` to the recipient.
    ///
    /// The change (sum of inputs minus `amount`), when positive, becomes a
    /// second output back to the sender at index 1.
    pub fn new(
        inputs: Vec<Utxo>,
        sender_pubkey: PublicKey,
        recipient_pubkey: &PublicKey,
        amount: i64,
    ) -> Result<Self, LedgerError> {
        let total_input: i64 = inputs.iter().map(|u| u.amount).sum();

        let mut outputs = vec![Utxo {
            tx_hash: TxHash::unset(),
            index: 0,
            amount,
            address: derive_address(recipient_pubkey)?,
        }];

        let change = total_input - amount;
        if change > 0 {
            outputs.push(Utxo {
                tx_hash: TxHash::unset(),
                index: 1,
                amount: change,
                address: derive_address(&sender_pubkey)?,
            });
        }

        let tx = Self {
            inputs,
            outputs,
            timestamp: unix_now_ms(),
            signature: String::new(),
            hash: TxHash::unset(),
            sender_pubkey,
        };

        if !tx.verify_content() {
            return Err(LedgerError::InvalidTransaction(
                "content verification failed".to_string(),
            ));
        }
        Ok(tx)
    }

    /// The canonical hash of this transaction's content: the whole value
    /// with `signature` and `hash` blanked out.
    pub fn signing_hash(&self) -> Result<TxHash, LedgerError> {
        let unsigned = Self {
            signature: String::new(),
            hash: TxHash::unset(),
            ..self.clone()
        };
        Ok(TxHash::new(hash_value(&unsigned)?))
    }

    /// Hash the content, sign the hash, and stamp both onto the
    /// transaction.
    pub fn sign(&mut self, private_key: &PrivateKey) -> Result<(), LedgerError> {
        let digest = self.signing_hash()?;
        self.signature = sign_hash(digest.as_str(), private_key)?;
        self.hash = digest;
        Ok(())
    }

    /// The output at `index`, stamped with this transaction's hash: the
    /// UTXO as it exists once the transaction is applied.
    pub fn output_utxo(&self, index: usize) -> Option<Utxo> {
        let output = self.outputs.get(index)?;
        Some(Utxo {
            tx_hash: self.hash.clone(),
            ..output.clone()
        })
    }

    pub fn total_input(&self) -> i64 {
        self.inputs.iter().map(|u| u.amount).sum()
    }

    pub fn total_output(&self) -> i64 {
        self.outputs.iter().map(|u| u.amount).sum()
    }

    /// Structural validity: balanced amounts, well-formed outputs, and
    /// every input owned by the sender.
    pub fn verify_content(&self) -> bool {
        if self.inputs.is_empty() {
            tracing::debug!("rejecting transaction without inputs");
            return false;
        }
        if self.outputs.is_empty() || self.outputs.len() > MAX_OUTPUTS {
            tracing::debug!(outputs = self.outputs.len(), "rejecting transaction output count");
            return false;
        }

        for input in &self.inputs {
            if input.amount <= 0 || input.tx_hash.is_empty() {
                tracing::debug!("rejecting transaction with malformed input");
                return false;
            }
        }
        for (i, output) in self.outputs.iter().enumerate() {
            if output.amount <= 0 || !output.tx_hash.is_empty() || output.index != i as i32 {
                tracing::debug!(index = i, "rejecting transaction with malformed output");
                return false;
            }
        }

        if self.total_input() != self.total_output() {
            tracing::debug!(
                input = self.total_input(),
                output = self.total_output(),
                "rejecting unbalanced transaction"
            );
            return false;
        }

        let Ok(sender_address) = derive_address(&self.sender_pubkey) else {
            tracing::debug!("rejecting transaction with undecodable sender key");
            return false;
        };
        if self.inputs.iter().any(|input| input.address != sender_address) {
            tracing::debug!(sender = %sender_address, "rejecting transaction spending foreign inputs");
            return false;
        }
        if self.outputs.len() > 1 && self.outputs[1].address != sender_address {
            tracing::debug!("rejecting transaction whose change is not the sender's");
            return false;
        }

        true
    }

    /// The ECDSA signature must verify over the stored hash with the
    /// sender's public key. The stored hash itself is bound into the
    /// enclosing block through the content hash.
    pub fn verify_signature(&self) -> bool {
        if self.hash.is_empty() || self.signature.is_empty() {
            return false;
        }
        matches!(
            verify_hash(self.hash.as_str(), &self.signature, &self.sender_pubkey),
            Ok(true)
        )
    }

    pub fn verify(&self) -> bool {
        self.verify_content() && self.verify_signature()
    }
}
