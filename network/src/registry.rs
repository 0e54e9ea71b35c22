//! Peer registry: known peers, their RPC channels, and the blacklist.
//!
//! The registry carries its own lock, separate from the node's chain
//! state, so peer bookkeeping never contends with block processing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channel::PeerChannel;
use crate::error::NetworkError;

/// Invalid blocks tolerated from one endpoint before it is blacklisted
/// for the rest of the process lifetime.
const BLACKLIST_THRESHOLD: u32 = 3;

struct RegistryInner {
    /// Open channels keyed by normalized `host:port`.
    clients: HashMap<String, Arc<PeerChannel>>,
    /// Endpoints whose blocks are no longer accepted.
    blacklisted: HashSet<String>,
    /// Invalid-block counters per endpoint.
    invalid_counts: HashMap<String, u32>,
}

pub struct PeerRegistry {
    default_port: u16,
    inner: Mutex<RegistryInner>,
}

impl PeerRegistry {
    pub fn new(default_port: u16) -> Self {
        Self {
            default_port,
            inner: Mutex::new(RegistryInner {
                clients: HashMap::new(),
                blacklisted: HashSet::new(),
                invalid_counts: HashMap::new(),
            }),
        }
    }

    /// Complete a bare host with the default port and validate the result.
    fn normalize(&self, raw: &str) -> Result<String, NetworkError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NetworkError::InvalidEndpoint("empty endpoint".to_string()));
        }

        let endpoint = if raw.contains(':') {
            raw.to_string()
        } else {
            tracing::info!(endpoint = raw, port = self.default_port, "appending default port");
            format!("{raw}:{}", self.default_port)
        };

        let Some((host, port)) = endpoint.rsplit_once(':') else {
            return Err(NetworkError::InvalidEndpoint(endpoint));
        };
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(NetworkError::InvalidEndpoint(endpoint));
        }
        Ok(endpoint)
    }

    /// Register one peer and open a (lazy) channel to it. Idempotent on
    /// duplicates.
    pub async fn add_peer(&self, raw: &str) -> Result<(), NetworkError> {
        let endpoint = self.normalize(raw)?;
        let mut inner = self.inner.lock().await;
        if inner.clients.contains_key(&endpoint) {
            tracing::debug!(peer = %endpoint, "peer already registered");
            return Ok(());
        }
        inner
            .clients
            .insert(endpoint.clone(), Arc::new(PeerChannel::new(endpoint.clone())));
        tracing::info!(peer = %endpoint, "peer added");
        Ok(())
    }

    /// Register a batch of peers. Entries may be comma-separated lists; a
    /// malformed entry is a warning, never fatal.
    pub async fn add_peers(&self, entries: &[String]) {
        for entry in entries {
            for part in entry.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if let Err(e) = self.add_peer(part).await {
                    tracing::warn!(endpoint = part, error = %e, "skipping invalid peer");
                }
            }
        }
    }

    /// Drop a peer and close its channel.
    pub async fn remove_peer(&self, raw: &str) {
        let Ok(endpoint) = self.normalize(raw) else {
            tracing::warn!(endpoint = raw, "cannot remove malformed endpoint");
            return;
        };
        let removed = {
            let mut inner = self.inner.lock().await;
            inner.clients.remove(&endpoint)
        };
        match removed {
            Some(channel) => {
                channel.close().await;
                tracing::info!(peer = %endpoint, "peer removed");
            }
            None => tracing::debug!(peer = %endpoint, "peer not registered"),
        }
    }

    /// Snapshot of all open channels, for broadcasting.
    pub async fn list_clients(&self) -> Vec<Arc<PeerChannel>> {
        self.inner.lock().await.clients.values().cloned().collect()
    }

    /// Registered peer endpoints.
    pub async fn list_peers(&self) -> Vec<String> {
        self.inner.lock().await.clients.keys().cloned().collect()
    }

    pub async fn peer_count(&self) -> usize {
        self.inner.lock().await.clients.len()
    }

    pub async fn is_blacklisted(&self, endpoint: &str) -> bool {
        self.inner.lock().await.blacklisted.contains(endpoint)
    }

    /// Record one invalid block from an endpoint. On the third strike the
    /// endpoint is blacklisted for the process lifetime; inbound
    /// submissions from it are rejected from then on. Returns whether the
    /// endpoint is now blacklisted.
    pub async fn mark_invalid(&self, endpoint: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let count = inner
            .invalid_counts
            .entry(endpoint.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
        let count = *count;

        if count >= BLACKLIST_THRESHOLD {
            inner.blacklisted.insert(endpoint.to_string());
            tracing::warn!(peer = endpoint, count, "peer blacklisted");
            true
        } else {
            tracing::info!(peer = endpoint, count, "invalid block recorded");
            false
        }
    }
}
