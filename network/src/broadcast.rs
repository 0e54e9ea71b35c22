//! Best-effort fan-out to every registered peer.
//!
//! Per-peer failures are logged and swallowed; gossip redundancy is the
//! delivery guarantee, not any single call.

use std::sync::Arc;

use naka_ledger::{Block, Transaction};
use naka_types::BlockHash;

use crate::registry::PeerRegistry;
use crate::wire::{RpcRequest, RpcResponse, WireBlock, WireTransaction};

/// Outcome counts of one fan-out round.
#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastResult {
    /// Peers that accepted the artifact.
    pub accepted: usize,
    /// Peers that answered but declined (duplicate, invalid, ...).
    pub declined: usize,
    /// Peers that could not be reached or answered garbage.
    pub failed: usize,
}

/// Outbound gossip interface over the peer registry.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<PeerRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Offer a transaction to every peer.
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> BroadcastResult {
        let request = RpcRequest::SubmitTransaction(WireTransaction::from(tx));
        let result = self.fan_out(&request).await;
        tracing::debug!(
            hash = %tx.hash,
            accepted = result.accepted,
            declined = result.declined,
            failed = result.failed,
            "transaction broadcast"
        );
        result
    }

    /// Offer a block, together with the announcing chain's trailing
    /// hashes, to every peer.
    pub async fn broadcast_block(&self, block: &Block, hashes: &[BlockHash]) -> BroadcastResult {
        let request = RpcRequest::SubmitBlock {
            block: WireBlock::from(block),
            last_100_hashes: hashes.iter().map(|h| h.as_str().to_string()).collect(),
        };
        let result = self.fan_out(&request).await;
        tracing::debug!(
            hash = %block.hash,
            height = block.header.height,
            accepted = result.accepted,
            declined = result.declined,
            failed = result.failed,
            "block broadcast"
        );
        result
    }

    async fn fan_out(&self, request: &RpcRequest) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        for channel in self.registry.list_clients().await {
            match channel.call(request).await {
                Ok(RpcResponse::Submit { accepted: true, .. }) => result.accepted += 1,
                Ok(RpcResponse::Submit { error, .. }) => {
                    tracing::debug!(peer = channel.endpoint(), error = %error, "peer declined");
                    result.declined += 1;
                }
                Ok(other) => {
                    tracing::warn!(peer = channel.endpoint(), response = ?other, "unexpected response");
                    result.failed += 1;
                }
                Err(e) => {
                    tracing::debug!(peer = channel.endpoint(), error = %e, "broadcast call failed");
                    result.failed += 1;
                }
            }
        }
        result
    }

    /// Ask peers, in registry order, for a block by hash; the first
    /// successful answer wins.
    pub async fn request_block(&self, hash: &BlockHash) -> Option<Block> {
        let request = RpcRequest::GetBlockByHash {
            hash: hash.as_str().to_string(),
        };
        for channel in self.registry.list_clients().await {
            match channel.call(&request).await {
                Ok(RpcResponse::Block {
                    block: Some(wire), ..
                }) => {
                    tracing::debug!(peer = channel.endpoint(), hash = %hash, "block fetched");
                    return Some(Block::from(wire));
                }
                Ok(RpcResponse::Block { error, .. }) => {
                    tracing::debug!(peer = channel.endpoint(), error = %error, "peer lacks block");
                }
                Ok(other) => {
                    tracing::warn!(peer = channel.endpoint(), response = ?other, "unexpected response");
                }
                Err(e) => {
                    tracing::debug!(peer = channel.endpoint(), error = %e, "block request failed");
                }
            }
        }
        tracing::warn!(hash = %hash, "block not available from any peer");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    use crate::channel::{read_frame, write_frame};

    /// Spin up a peer that answers every request with `response`.
    async fn canned_peer(response: RpcResponse) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    while read_frame(&mut stream).await.is_ok() {
                        let body = bincode::serialize(&response).unwrap();
                        if write_frame(&mut stream, &body).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
        addr
    }

    fn sample_block() -> Block {
        let mut block = Block::new(
            naka_types::BlockHash::from("prev"),
            1,
            "f".repeat(64),
            vec![],
        )
        .unwrap();
        loop {
            let hash = block.header_hash().unwrap();
            if block.hash_meets_difficulty(&hash) {
                block.hash = hash;
                return block;
            }
            block.header.nonce += 1;
        }
    }

    #[tokio::test]
    async fn fan_out_counts_accepts_and_failures() {
        let registry = Arc::new(PeerRegistry::new(50051));
        let good = canned_peer(RpcResponse::Submit {
            accepted: true,
            error: String::new(),
        })
        .await;
        registry.add_peer(&good).await.unwrap();
        registry.add_peer("127.0.0.1:1").await.unwrap(); // unreachable

        let broadcaster = Broadcaster::new(registry);
        let block = sample_block();
        let result = broadcaster
            .broadcast_block(&block, &[block.hash.clone()])
            .await;
        assert_eq!(result.accepted, 1);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn declines_are_not_failures() {
        let registry = Arc::new(PeerRegistry::new(50051));
        let dup = canned_peer(RpcResponse::Submit {
            accepted: false,
            error: "duplicate".into(),
        })
        .await;
        registry.add_peer(&dup).await.unwrap();

        let broadcaster = Broadcaster::new(registry);
        let block = sample_block();
        let result = broadcaster.broadcast_block(&block, &[]).await;
        assert_eq!(result.declined, 1);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn request_block_takes_first_success() {
        let block = sample_block();
        let registry = Arc::new(PeerRegistry::new(50051));

        let empty = canned_peer(RpcResponse::Block {
            block: None,
            error: "block not found".into(),
        })
        .await;
        let holder = canned_peer(RpcResponse::Block {
            block: Some(WireBlock::from(&block)),
            error: String::new(),
        })
        .await;
        registry.add_peer("127.0.0.1:1").await.unwrap();
        registry.add_peer(&empty).await.unwrap();
        registry.add_peer(&holder).await.unwrap();

        let broadcaster = Broadcaster::new(registry);
        let fetched = broadcaster.request_block(&block.hash).await.unwrap();
        assert_eq!(fetched.hash, block.hash);
    }

    #[tokio::test]
    async fn request_block_none_when_no_peer_has_it() {
        let registry = Arc::new(PeerRegistry::new(50051));
        let empty = canned_peer(RpcResponse::Block {
            block: None,
            error: "block not found".into(),
        })
        .await;
        registry.add_peer(&empty).await.unwrap();

        let broadcaster = Broadcaster::new(registry);
        assert!(broadcaster
            .request_block(&naka_types::BlockHash::from("nope"))
            .await
            .is_none());
    }
}
