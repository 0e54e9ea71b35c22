//! Canonical content hashing.
//!
//! The hash of a value is the lowercase-hex SHA-256 digest of its
//! `serde_json` encoding. Struct fields serialize in declaration order and
//! a bare string encodes as a JSON string, quotes included. The encoding is
//! an implementation choice; what the protocol requires is that every node
//! on a network computes it identically, so it must not change.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Lowercase-hex SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Hash a serializable value through the canonical JSON encoding.
pub fn hash_value<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let encoded =
        serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(sha256_hex(&encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Header {
        timestamp: i64,
        previous_hash: String,
        nonce: i64,
    }

    #[test]
    fn sha256_hex_known_vector() {
        // SHA-256 of the empty input.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_value_is_deterministic() {
        let h = Header {
            timestamp: 42,
            previous_hash: "ab".into(),
            nonce: 7,
        };
        assert_eq!(hash_value(&h).unwrap(), hash_value(&h).unwrap());
    }

    #[test]
    fn hash_value_depends_on_every_field() {
        let a = Header {
            timestamp: 42,
            previous_hash: "ab".into(),
            nonce: 7,
        };
        let b = Header {
            timestamp: 42,
            previous_hash: "ab".into(),
            nonce: 8,
        };
        assert_ne!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn string_hashes_include_json_quotes() {
        // hash_value of a &str hashes the JSON form, i.e. `"abc"`.
        let via_value = hash_value(&"abc").unwrap();
        assert_eq!(via_value, sha256_hex(b"\"abc\""));
        assert_ne!(via_value, sha256_hex(b"abc"));
    }

    #[test]
    fn output_is_lowercase_hex() {
        let h = hash_value(&123u32).unwrap();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
