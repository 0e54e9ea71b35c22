//! Cryptographic primitives for the naka chain.
//!
//! - **SHA-256** over a canonical JSON encoding for transaction, content
//!   and header hashes
//! - **ECDSA (P-256)** for transaction signing and verification
//! - Address derivation: `base64( 0x00 || sha256(decoded_pubkey)[..20] )`
//!
//! Keys travel as base64-encoded DER strings (`naka_types::{PublicKey,
//! PrivateKey}`) and are parsed here only at the point of use.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::derive_address;
pub use error::CryptoError;
pub use hash::{hash_value, sha256_hex};
pub use keys::{generate_keypair, KeyPair};
pub use sign::{sign_hash, verify_hash};
