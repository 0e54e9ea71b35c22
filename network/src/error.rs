use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid peer endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
