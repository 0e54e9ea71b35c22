use naka_types::{BlockHash, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(TxHash),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("duplicate block {0}")]
    DuplicateBlock(BlockHash),

    #[error("no common ancestor between local chain and fork")]
    NoCommonAncestor,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] naka_crypto::CryptoError),
}
