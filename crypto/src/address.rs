//! Wallet address derivation from public keys.
//!
//! Address format: `base64( version_byte || sha256(decoded_pubkey)[..20] )`
//! with version byte `0x00`. The address hashes the raw decoded key bytes,
//! so derivation works even for keys whose DER structure was never parsed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use naka_types::{Address, PublicKey};

use crate::error::CryptoError;
use crate::keys::decode_public_bytes;

/// Version byte prepended to the truncated key hash.
const VERSION_BYTE: u8 = 0x00;
/// How many bytes of the SHA-256 digest the address keeps.
const HASH_PREFIX_LEN: usize = 20;

/// Derive the wallet address owned by a public key.
///
/// Deterministic and pure; fails only when the key is not valid base64.
pub fn derive_address(public_key: &PublicKey) -> Result<Address, CryptoError> {
    let key_bytes = decode_public_bytes(public_key)?;
    let digest = Sha256::digest(&key_bytes);

    let mut versioned = Vec::with_capacity(1 + HASH_PREFIX_LEN);
    versioned.push(VERSION_BYTE);
    versioned.extend_from_slice(&digest[..HASH_PREFIX_LEN]);

    Ok(Address::new(BASE64.encode(versioned)))
}
