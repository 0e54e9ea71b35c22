use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key material could not be decoded or parsed as a P-256 key.
    #[error("invalid key")]
    InvalidKey,

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
