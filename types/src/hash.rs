//! Hash types for transactions and block headers.
//!
//! Hashes are lowercase-hex SHA-256 digests carried as strings, because the
//! protocol compares a header hash to its difficulty target by parsing both
//! as hexadecimal big integers. The empty string doubles as a sentinel: a
//! freshly created output UTXO has an empty `TxHash` until it is stamped,
//! and the genesis block's previous-hash is the empty `BlockHash`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The SHA-256 hash of a transaction, as lowercase hex.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The unset sentinel carried by output UTXOs before they are realized.
    pub fn unset() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", abbrev(&self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The SHA-256 hash of a block header, as lowercase hex.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The empty previous-hash carried by the genesis block header.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", abbrev(&self.0))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// First eight hex chars, or `<empty>` for sentinels.
fn abbrev(s: &str) -> &str {
    if s.is_empty() {
        "<empty>"
    } else if s.len() > 8 {
        &s[..8]
    } else {
        s
    }
}
