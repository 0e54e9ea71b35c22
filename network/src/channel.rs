//! Framed point-to-point RPC channel.
//!
//! Frames are a 4-byte big-endian length prefix followed by a bincode
//! payload. A [`PeerChannel`] connects lazily, keeps the TCP stream cached
//! between calls, and serializes calls through its own mutex, which is
//! also what makes RPC ordering per-channel: two calls on one channel
//! never interleave on the wire.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::NetworkError;
use crate::wire::{RpcRequest, RpcResponse};

/// Upper bound on a single frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Deadline for one outbound call, connect included.
pub const CALL_DEADLINE: Duration = Duration::from_secs(5);

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame, rejecting oversized bodies.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {body_len} > {MAX_FRAME_SIZE}"),
        ));
    }
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// An outbound RPC channel to one peer endpoint.
pub struct PeerChannel {
    endpoint: String,
    stream: Mutex<Option<TcpStream>>,
}

impl PeerChannel {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            stream: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one unary call under [`CALL_DEADLINE`].
    ///
    /// A cached connection that fails is dropped and retried once with a
    /// fresh one; a failing fresh connection reports the peer unreachable.
    pub async fn call(&self, request: &RpcRequest) -> Result<RpcResponse, NetworkError> {
        let payload =
            bincode::serialize(request).map_err(|e| NetworkError::Codec(e.to_string()))?;

        let mut slot = self.stream.lock().await;
        let had_cached = slot.is_some();

        match self.exchange(&mut slot, &payload).await {
            Ok(response) => Ok(response),
            Err(first) => {
                *slot = None;
                if !had_cached {
                    return Err(first);
                }
                // The cached stream may simply have been closed by the
                // remote while idle.
                tracing::debug!(peer = %self.endpoint, error = %first, "retrying on fresh connection");
                self.exchange(&mut slot, &payload).await.map_err(|e| {
                    *slot = None;
                    e
                })
            }
        }
    }

    async fn exchange(
        &self,
        slot: &mut Option<TcpStream>,
        payload: &[u8],
    ) -> Result<RpcResponse, NetworkError> {
        let outcome = tokio::time::timeout(CALL_DEADLINE, async {
            if slot.is_none() {
                let stream = TcpStream::connect(&self.endpoint).await?;
                *slot = Some(stream);
            }
            let Some(stream) = slot.as_mut() else {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "connection slot empty",
                ));
            };
            write_frame(stream, payload).await?;
            read_frame(stream).await
        })
        .await;

        match outcome {
            Ok(Ok(body)) => {
                bincode::deserialize(&body).map_err(|e| NetworkError::Codec(e.to_string()))
            }
            Ok(Err(e)) => Err(NetworkError::PeerUnreachable(format!(
                "{}: {e}",
                self.endpoint
            ))),
            Err(_) => Err(NetworkError::PeerUnreachable(format!(
                "{}: deadline exceeded",
                self.endpoint
            ))),
        }
    }

    /// Drop the cached connection, if any.
    pub async fn close(&self) {
        *self.stream.lock().await = None;
    }
}
