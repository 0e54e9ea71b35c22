//! Key material as it travels through the system.
//!
//! Keys are carried as base64-encoded DER strings, the format the external
//! key-generation utility emits and the wire protocol transports. Parsing
//! into curve points happens in `naka_crypto` only where a signature is
//! produced or checked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A base64-encoded PKIX/DER public key (ECDSA P-256).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn new(b64: impl Into<String>) -> Self {
        Self(b64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = if self.0.len() > 12 { &self.0[..12] } else { &self.0 };
        write!(f, "PublicKey({head}…)")
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublicKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A base64-encoded SEC1/DER private key (ECDSA P-256).
///
/// Deliberately has no `Display` impl; the debug form is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(b64: impl Into<String>) -> Self {
        Self(b64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

impl From<&str> for PrivateKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
