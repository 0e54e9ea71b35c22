//! ECDSA P-256 signing over precomputed hashes.
//!
//! The message is always a hex-encoded SHA-256 digest; it is signed as a
//! prehash, never re-hashed. A signature is the fixed-width big-endian
//! `r || s` concatenation (64 bytes), hex-encoded.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::Signature;

use naka_types::{PrivateKey, PublicKey};

use crate::error::CryptoError;
use crate::keys::{parse_signing_key, parse_verifying_key};

/// Sign a hex-encoded hash with a private key, returning a hex signature.
pub fn sign_hash(hash_hex: &str, private_key: &PrivateKey) -> Result<String, CryptoError> {
    let digest = hex::decode(hash_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let signing_key = parse_signing_key(private_key)?;

    let signature: Signature = signing_key
        .sign_prehash(&digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    Ok(hex::encode(signature.to_bytes()))
}

/// Verify a hex signature over a hex-encoded hash.
///
/// Returns `Ok(false)` for a well-formed but wrong signature and
/// `Err(CryptoError::InvalidKey)` when the public key cannot be parsed.
pub fn verify_hash(
    hash_hex: &str,
    signature_hex: &str,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    let verifying_key = parse_verifying_key(public_key)?;

    let Ok(digest) = hex::decode(hash_hex) else {
        return Ok(false);
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return Ok(false);
    };

    Ok(verifying_key.verify_prehash(&digest, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;
    use crate::keys::generate_keypair;

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair().unwrap();
        let hash = sha256_hex(b"a transaction");
        let sig = sign_hash(&hash, &kp.private).unwrap();
        assert!(verify_hash(&hash, &sig, &kp.public).unwrap());
    }

    #[test]
    fn signature_is_64_bytes_hex() {
        let kp = generate_keypair().unwrap();
        let sig = sign_hash(&sha256_hex(b"x"), &kp.private).unwrap();
        assert_eq!(sig.len(), 128);
    }

    #[test]
    fn wrong_hash_fails() {
        let kp = generate_keypair().unwrap();
        let sig = sign_hash(&sha256_hex(b"original"), &kp.private).unwrap();
        assert!(!verify_hash(&sha256_hex(b"tampered"), &sig, &kp.public).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let signer = generate_keypair().unwrap();
        let other = generate_keypair().unwrap();
        let hash = sha256_hex(b"payload");
        let sig = sign_hash(&hash, &signer.private).unwrap();
        assert!(!verify_hash(&hash, &sig, &other.public).unwrap());
    }

    #[test]
    fn flipped_signature_byte_fails() {
        let kp = generate_keypair().unwrap();
        let hash = sha256_hex(b"payload");
        let mut sig = sign_hash(&hash, &kp.private).unwrap();
        // Flip one nibble somewhere in the middle of r.
        let flipped = if &sig[10..11] == "0" { "1" } else { "0" };
        sig.replace_range(10..11, flipped);
        assert!(!verify_hash(&hash, &sig, &kp.public).unwrap());
    }

    #[test]
    fn malformed_signature_is_false_not_error() {
        let kp = generate_keypair().unwrap();
        let hash = sha256_hex(b"payload");
        assert!(!verify_hash(&hash, "zz-not-hex", &kp.public).unwrap());
        assert!(!verify_hash(&hash, "beef", &kp.public).unwrap());
    }

    #[test]
    fn malformed_public_key_is_invalid_key() {
        let kp = generate_keypair().unwrap();
        let hash = sha256_hex(b"payload");
        let sig = sign_hash(&hash, &kp.private).unwrap();
        let err = verify_hash(&hash, &sig, &PublicKey::new("AAAA")).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey));
    }
}
