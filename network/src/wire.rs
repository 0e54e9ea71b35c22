//! On-wire message types and their conversions to ledger types.
//!
//! Every peer RPC is a single request frame answered by a single response
//! frame; frames carry bincode-encoded [`RpcRequest`] / [`RpcResponse`]
//! envelopes. The wire structs deliberately mirror the ledger types
//! field-for-field so that conversion is a mechanical re-labelling; the
//! codec exists so the internal representation can move without breaking
//! the protocol.

use serde::{Deserialize, Serialize};

use naka_ledger::{Block, BlockHeader, Transaction, Utxo};
use naka_types::{Address, BlockHash, PublicKey, TxHash};

/// The four unary peer RPCs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RpcRequest {
    SubmitTransaction(WireTransaction),
    SubmitBlock {
        block: WireBlock,
        last_100_hashes: Vec<String>,
    },
    GetBlockByHash {
        hash: String,
    },
    GetTransactionStatus {
        hash: String,
        k: i64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RpcResponse {
    /// Answer to both submit RPCs.
    Submit { accepted: bool, error: String },
    /// Answer to `GetBlockByHash`; not-found carries `None` and a reason.
    Block {
        block: Option<WireBlock>,
        error: String,
    },
    /// Answer to `GetTransactionStatus`.
    TransactionStatus { confirmed: bool, error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireUtxo {
    pub tx_hash: String,
    pub index: i32,
    pub amount: i64,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub inputs: Vec<WireUtxo>,
    pub outputs: Vec<WireUtxo>,
    pub timestamp: i64,
    pub signature: String,
    pub hash: String,
    pub sender_pubkey: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlockHeader {
    pub timestamp: i64,
    pub previous_hash: String,
    pub content_hash: String,
    pub height: i32,
    pub difficulty: String,
    pub nonce: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlockContent {
    pub transactions: Vec<WireTransaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlock {
    pub header: WireBlockHeader,
    pub content: WireBlockContent,
    pub hash: String,
}

// ── Ledger → wire ──────────────────────────────────────────────────────

impl From<&Utxo> for WireUtxo {
    fn from(u: &Utxo) -> Self {
        Self {
            tx_hash: u.tx_hash.as_str().to_string(),
            index: u.index,
            amount: u.amount,
            address: u.address.as_str().to_string(),
        }
    }
}

impl From<&Transaction> for WireTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            inputs: tx.inputs.iter().map(WireUtxo::from).collect(),
            outputs: tx.outputs.iter().map(WireUtxo::from).collect(),
            timestamp: tx.timestamp,
            signature: tx.signature.clone(),
            hash: tx.hash.as_str().to_string(),
            sender_pubkey: tx.sender_pubkey.as_str().to_string(),
        }
    }
}

impl From<&Block> for WireBlock {
    fn from(b: &Block) -> Self {
        Self {
            header: WireBlockHeader {
                timestamp: b.header.timestamp,
                previous_hash: b.header.previous_hash.as_str().to_string(),
                content_hash: b.header.content_hash.clone(),
                height: b.header.height,
                difficulty: b.header.difficulty.clone(),
                nonce: b.header.nonce,
            },
            content: WireBlockContent {
                transactions: b.transactions.iter().map(WireTransaction::from).collect(),
            },
            hash: b.hash.as_str().to_string(),
        }
    }
}

// ── Wire → ledger ──────────────────────────────────────────────────────

impl From<WireUtxo> for Utxo {
    fn from(u: WireUtxo) -> Self {
        Self {
            tx_hash: TxHash::new(u.tx_hash),
            index: u.index,
            amount: u.amount,
            address: Address::new(u.address),
        }
    }
}

impl From<WireTransaction> for Transaction {
    fn from(tx: WireTransaction) -> Self {
        Self {
            inputs: tx.inputs.into_iter().map(Utxo::from).collect(),
            outputs: tx.outputs.into_iter().map(Utxo::from).collect(),
            timestamp: tx.timestamp,
            signature: tx.signature,
            hash: TxHash::new(tx.hash),
            sender_pubkey: PublicKey::new(tx.sender_pubkey),
        }
    }
}

impl From<WireBlock> for Block {
    fn from(b: WireBlock) -> Self {
        Self {
            header: BlockHeader {
                timestamp: b.header.timestamp,
                previous_hash: BlockHash::new(b.header.previous_hash),
                content_hash: b.header.content_hash,
                height: b.header.height,
                difficulty: b.header.difficulty,
                nonce: b.header.nonce,
            },
            transactions: b.content.transactions.into_iter().map(Transaction::from).collect(),
            hash: BlockHash::new(b.hash),
        }
    }
}
