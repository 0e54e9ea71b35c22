//! Wallet address type.
//!
//! An address is an opaque textual identifier derived from a public key as
//! `base64( 0x00 || sha256(decoded_pubkey)[..20] )`. Derivation lives in
//! `naka_crypto`; this crate only carries the value around.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A base64-encoded, hash-derived wallet address.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_textual() {
        assert_eq!(Address::new("AB=="), Address::from("AB=="));
        assert_ne!(Address::new("AB=="), Address::new("CD=="));
    }

    #[test]
    fn serializes_as_bare_string() {
        let a = Address::new("AJ+k");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"AJ+k\"");
    }
}
