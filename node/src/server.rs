//! Inbound peer RPC server.
//!
//! Accepts TCP connections and answers length-prefixed bincode frames,
//! one response per request. The endpoint used for
//! blacklisting is the transport peer address of the caller.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use naka_ledger::{Block, Transaction};
use naka_network::{read_frame, write_frame, RpcRequest, RpcResponse, WireBlock};
use naka_types::{BlockHash, TxHash};

use crate::error::NodeError;
use crate::node::Node;

/// Idle connections are closed after this long without a request.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bind the RPC listener and spawn the accept loop.
pub async fn spawn_rpc_server(node: Arc<Node>, port: u16) -> Result<JoinHandle<()>, NodeError> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "peer RPC server listening");

    let mut shutdown_rx = node.shutdown.subscribe();
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("RPC server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let node = Arc::clone(&node);
                            tokio::spawn(handle_connection(node, stream, peer_addr));
                        }
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }))
}

async fn handle_connection(node: Arc<Node>, mut stream: TcpStream, peer_addr: SocketAddr) {
    let peer = peer_addr.to_string();
    tracing::debug!(peer = %peer, "peer connected");

    loop {
        let frame = match tokio::time::timeout(IDLE_TIMEOUT, read_frame(&mut stream)).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    tracing::debug!(peer = %peer, error = %e, "read failed");
                }
                break;
            }
            Err(_) => {
                tracing::debug!(peer = %peer, "connection idle, closing");
                break;
            }
        };

        let request: RpcRequest = match bincode::deserialize(&frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "undecodable frame, closing connection");
                break;
            }
        };

        let response = dispatch(&node, request, &peer).await;
        let body = match bincode::serialize(&response) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                break;
            }
        };
        if let Err(e) = write_frame(&mut stream, &body).await {
            tracing::debug!(peer = %peer, error = %e, "write failed");
            break;
        }
    }

    tracing::debug!(peer = %peer, "peer disconnected");
}

/// Route one request to the coordinator. Every internal error becomes a
/// response payload; nothing here panics or drops the connection.
async fn dispatch(node: &Node, request: RpcRequest, peer: &str) -> RpcResponse {
    match request {
        RpcRequest::SubmitTransaction(wire) => {
            let tx = Transaction::from(wire);
            match node.submit_transaction(tx).await {
                Ok(()) => RpcResponse::Submit {
                    accepted: true,
                    error: String::new(),
                },
                Err(e) => RpcResponse::Submit {
                    accepted: false,
                    error: e.to_string(),
                },
            }
        }

        RpcRequest::SubmitBlock {
            block,
            last_100_hashes,
        } => {
            let block = Block::from(block);
            let hashes = last_100_hashes.into_iter().map(BlockHash::new).collect();
            match node.submit_block(block, hashes, peer).await {
                Ok(()) => RpcResponse::Submit {
                    accepted: true,
                    error: String::new(),
                },
                Err(e) => RpcResponse::Submit {
                    accepted: false,
                    error: e.to_string(),
                },
            }
        }

        RpcRequest::GetBlockByHash { hash } => {
            match node.block_by_hash(&BlockHash::new(hash)).await {
                Some(block) => RpcResponse::Block {
                    block: Some(WireBlock::from(&block)),
                    error: String::new(),
                },
                None => RpcResponse::Block {
                    block: None,
                    error: "block not found".to_string(),
                },
            }
        }

        RpcRequest::GetTransactionStatus { hash, k } => {
            let (confirmed, depth) = node.transaction_status(&TxHash::new(hash.clone()), k).await;
            if confirmed {
                RpcResponse::TransactionStatus {
                    confirmed: true,
                    error: String::new(),
                }
            } else {
                RpcResponse::TransactionStatus {
                    confirmed: false,
                    error: format!(
                        "transaction {hash} not confirmed with k={k}, has depth of {depth}"
                    ),
                }
            }
        }
    }
}
