//! Chain state for the naka node: the UTXO index, transactions, blocks,
//! the chain itself (difficulty schedule and fork resolution included) and
//! the pending-transaction pool.
//!
//! Everything in this crate is synchronous and single-threaded; the node
//! coordinator serializes access behind its state mutex.

pub mod block;
pub mod chain;
pub mod error;
pub mod mempool;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockHeader};
pub use chain::{Chain, ForkPlan};
pub use error::LedgerError;
pub use mempool::Mempool;
pub use transaction::Transaction;
pub use utxo::{Utxo, UtxoIndex};
