//! Blocks: header, content hash, and proof-of-work verification.

use serde::{Deserialize, Serialize};

use naka_crypto::hash_value;
use naka_types::{unix_now_ms, BlockHash};
use naka_work::hash_meets_target;

use crate::error::LedgerError;
use crate::transaction::Transaction;

/// The mined part of a block. The block hash is the canonical hash of
/// exactly this value, so every field (the nonce included) is bound by
/// proof-of-work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub timestamp: i64,
    pub previous_hash: BlockHash,
    pub content_hash: String,
    pub height: i32,
    pub difficulty: String,
    pub nonce: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub hash: BlockHash,
}

impl Block {
    /// Assemble an unmined candidate: nonce zero, empty hash, content hash
    /// computed over the given transactions.
    pub fn new(
        previous_hash: BlockHash,
        height: i32,
        difficulty: String,
        transactions: Vec<Transaction>,
    ) -> Result<Self, LedgerError> {
        let content_hash = Self::compute_content_hash(&transactions)?;
        Ok(Self {
            header: BlockHeader {
                timestamp: unix_now_ms(),
                previous_hash,
                content_hash,
                height,
                difficulty,
                nonce: 0,
            },
            transactions,
            hash: BlockHash::none(),
        })
    }

    /// The deterministic height-0 block: timestamp zero, empty previous
    /// hash, no transactions, the given initial difficulty, and its header
    /// hash computed and stored. Every node on a network builds the exact
    /// same genesis block.
    pub fn genesis(initial_difficulty: String) -> Result<Self, LedgerError> {
        let mut block = Self {
            header: BlockHeader {
                timestamp: 0,
                previous_hash: BlockHash::none(),
                content_hash: Self::compute_content_hash(&[])?,
                height: 0,
                difficulty: initial_difficulty,
                nonce: 0,
            },
            transactions: Vec::new(),
            hash: BlockHash::none(),
        };
        block.hash = block.header_hash()?;
        Ok(block)
    }

    /// Hash of the concatenated transaction hashes. Every transaction must
    /// carry a hash and individually verify.
    pub fn compute_content_hash(transactions: &[Transaction]) -> Result<String, LedgerError> {
        let mut concatenated = String::new();
        for tx in transactions {
            if tx.hash.is_empty() {
                return Err(LedgerError::InvalidTransaction(
                    "transaction hash is empty".to_string(),
                ));
            }
            if !tx.verify() {
                return Err(LedgerError::InvalidTransaction(format!(
                    "transaction {} failed verification",
                    tx.hash
                )));
            }
            concatenated.push_str(tx.hash.as_str());
        }
        Ok(hash_value(&concatenated)?)
    }

    /// Canonical hash of the header.
    pub fn header_hash(&self) -> Result<BlockHash, LedgerError> {
        Ok(BlockHash::new(hash_value(&self.header)?))
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == 0 && self.header.previous_hash.is_empty()
    }

    /// The proof-of-work acceptance test against this header's difficulty.
    pub fn hash_meets_difficulty(&self, hash: &BlockHash) -> bool {
        hash_meets_target(hash.as_str(), &self.header.difficulty)
    }

    /// Full block validity: content hash matches the transactions, the
    /// stored hash matches the header, and, genesis excepted, the hash
    /// satisfies the difficulty target.
    pub fn verify(&self) -> bool {
        let Ok(content_hash) = Self::compute_content_hash(&self.transactions) else {
            return false;
        };
        if content_hash != self.header.content_hash {
            return false;
        }

        let Ok(header_hash) = self.header_hash() else {
            return false;
        };
        if header_hash != self.hash {
            return false;
        }

        self.is_genesis() || self.hash_meets_difficulty(&header_hash)
    }
}
