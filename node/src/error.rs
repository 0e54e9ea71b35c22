use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] naka_ledger::LedgerError),

    #[error("network error: {0}")]
    Network(#[from] naka_network::NetworkError),

    #[error("crypto error: {0}")]
    Crypto(#[from] naka_crypto::CryptoError),

    #[error("peer {0} is blacklisted")]
    PeerBlacklisted(String),

    #[error("mining is already in progress")]
    Busy,

    #[error("mining is not active")]
    NotRunning,

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
