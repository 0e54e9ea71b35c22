//! P-256 key parsing and generation.
//!
//! Private keys are base64-encoded SEC1 DER, public keys base64-encoded
//! PKIX (SubjectPublicKeyInfo) DER, the formats the key-generation utility
//! writes. Parsing failures of any kind collapse into
//! [`CryptoError::InvalidKey`]; callers never learn which layer rejected
//! the material.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::SecretKey;
use rand::rngs::OsRng;

use naka_types::{PrivateKey, PublicKey};

use crate::error::CryptoError;

/// A freshly generated P-256 keypair in transport encoding.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// Generate a random P-256 keypair.
///
/// Mainly used by tests and tooling; a running node never creates keys.
pub fn generate_keypair() -> Result<KeyPair, CryptoError> {
    let secret = SecretKey::random(&mut OsRng);

    let private_der = secret
        .to_sec1_der()
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    let public_der = secret
        .public_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    Ok(KeyPair {
        public: PublicKey::new(BASE64.encode(public_der.as_bytes())),
        private: PrivateKey::new(BASE64.encode(private_der.as_slice())),
    })
}

/// Decode the base64 wrapper of a public key without parsing the DER.
/// Address derivation hashes these raw bytes.
pub(crate) fn decode_public_bytes(public: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(public.as_str())
        .map_err(|_| CryptoError::InvalidKey)
}

/// Parse a base64 SEC1-DER private key into a signing key.
pub(crate) fn parse_signing_key(private: &PrivateKey) -> Result<SigningKey, CryptoError> {
    let der = BASE64
        .decode(private.as_str())
        .map_err(|_| CryptoError::InvalidKey)?;
    let secret = SecretKey::from_sec1_der(&der).map_err(|_| CryptoError::InvalidKey)?;
    Ok(SigningKey::from(secret))
}

/// Parse a base64 PKIX-DER public key into a verifying key.
pub(crate) fn parse_verifying_key(public: &PublicKey) -> Result<VerifyingKey, CryptoError> {
    let der = decode_public_bytes(public)?;
    let key = p256::PublicKey::from_public_key_der(&der).map_err(|_| CryptoError::InvalidKey)?;
    Ok(VerifyingKey::from(key))
}
