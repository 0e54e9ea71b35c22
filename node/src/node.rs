//! The node coordinator.
//!
//! Owns the chain and mempool behind one coarse mutex and the peer fabric
//! behind its own. Every ingestion path and every mining commit acquires
//! the state mutex; proof-of-work search and signature verification run
//! outside it. The mutex linearizes all state transitions: for any two
//! mutating operations, one observes the other's post-state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use naka_ledger::{Block, Chain, LedgerError, Mempool, Transaction, Utxo};
use naka_network::{Broadcaster, PeerRegistry};
use naka_types::{BlockHash, TxHash};

use crate::config::{load_seed_utxos, NodeConfig};
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::miner::{self, MinerMode};
use crate::shutdown::ShutdownController;

/// The state guarded by the coordinator's single mutex.
pub struct NodeState {
    pub chain: Chain,
    pub mempool: Mempool,
}

pub struct Node {
    state: Mutex<NodeState>,
    peers: Arc<PeerRegistry>,
    broadcaster: Broadcaster,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    config: NodeConfig,
    mode: MinerMode,

    /// Whether the mining task is running.
    mining: AtomicBool,
    /// Stop signal of the current mining task.
    miner_stop: Mutex<Option<watch::Sender<bool>>>,
    /// Bumped on every miner start, so a lingering old task's exit
    /// cleanup cannot clobber a newer session.
    miner_generation: AtomicU64,
}

impl Node {
    /// Build a node over the given seed outputs.
    pub fn new(config: NodeConfig, initial_utxos: Vec<Utxo>) -> Result<Arc<Self>, NodeError> {
        let chain = Chain::new(initial_utxos, config.params.clone())?;
        let peers = Arc::new(PeerRegistry::new(config.params.default_rpc_port));
        let broadcaster = Broadcaster::new(Arc::clone(&peers));
        let mode = MinerMode::from_flag(config.mode);
        if mode != MinerMode::Honest {
            tracing::warn!(?mode, "node starts in a misbehavior mode");
        }

        let metrics = Arc::new(NodeMetrics::new());
        metrics.chain_height.set(0);

        Ok(Arc::new(Self {
            state: Mutex::new(NodeState {
                chain,
                mempool: Mempool::new(),
            }),
            peers,
            broadcaster,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            config,
            mode,
            mining: AtomicBool::new(false),
            miner_stop: Mutex::new(None),
            miner_generation: AtomicU64::new(0),
        }))
    }

    /// Build a node from its configuration: load the seed file and
    /// register the configured peers.
    pub async fn from_config(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        let seeds = load_seed_utxos(&config.utxo_file)?;
        let peers = config.peers.clone();
        let node = Self::new(config, seeds)?;
        node.peers.add_peers(&peers).await;
        node.metrics.peer_count.set(node.peers.peer_count().await as i64);
        Ok(node)
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn mode(&self) -> MinerMode {
        self.mode
    }

    pub(crate) fn state(&self) -> &Mutex<NodeState> {
        &self.state
    }

    // ── Transaction ingestion ───────────────────────────────────────────

    /// Accept a transaction into the mempool and gossip it.
    ///
    /// Rejected when it fails self-verification, when its inputs are not
    /// currently spendable, or when it is already pooled or mined.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), NodeError> {
        tracing::debug!(hash = %tx.hash, "transaction received");

        if !tx.verify() {
            self.metrics.transactions_rejected.inc();
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {} failed verification",
                tx.hash
            ))
            .into());
        }

        {
            let mut state = self.state.lock().await;
            if state.mempool.contains(&tx.hash) || state.chain.has_tx(&tx.hash) {
                self.metrics.transactions_rejected.inc();
                return Err(LedgerError::DuplicateTransaction(tx.hash.clone()).into());
            }
            if !state.chain.utxo_index().check_tx(&tx) {
                self.metrics.transactions_rejected.inc();
                return Err(LedgerError::InvalidTransaction(format!(
                    "inputs of {} are not spendable",
                    tx.hash
                ))
                .into());
            }
            state.mempool.add(tx.clone())?;
            self.metrics.mempool_size.set(state.mempool.len() as i64);
        }

        self.metrics.transactions_accepted.inc();
        self.broadcaster.broadcast_transaction(&tx).await;
        tracing::debug!(hash = %tx.hash, "transaction pooled and broadcast");
        Ok(())
    }

    // ── Block ingestion ─────────────────────────────────────────────────

    /// Handle a block submitted by a peer together with the announcing
    /// chain's trailing hashes.
    pub async fn submit_block(
        &self,
        block: Block,
        hashes: Vec<BlockHash>,
        peer_endpoint: &str,
    ) -> Result<(), NodeError> {
        if self.peers.is_blacklisted(peer_endpoint).await {
            tracing::debug!(peer = peer_endpoint, "rejecting block from blacklisted peer");
            return Err(NodeError::PeerBlacklisted(peer_endpoint.to_string()));
        }

        tracing::debug!(
            hash = %block.hash,
            height = block.header.height,
            peer = peer_endpoint,
            "block received"
        );

        // While withholding its own early blocks, a mode-3 node swallows
        // peers' blocks at those heights without applying them.
        if self.mode == MinerMode::Withhold && miner::WITHHOLD_HEIGHTS.contains(&block.header.height)
        {
            tracing::info!(height = block.header.height, "silently swallowing peer block");
            return Ok(());
        }

        if !block.verify() {
            self.metrics.blocks_rejected.inc();
            self.peers.mark_invalid(peer_endpoint).await;
            return Err(LedgerError::InvalidBlock(format!(
                "block {} from {peer_endpoint} failed verification",
                block.hash
            ))
            .into());
        }

        let mut state = self.state.lock().await;

        // Extends the tail: append and re-gossip.
        if block.header.previous_hash == state.chain.last_block().hash {
            if let Err(e) = state.chain.add_block(block.clone()) {
                self.metrics.blocks_rejected.inc();
                return Err(e.into());
            }
            for tx in &block.transactions {
                state.mempool.discard(&tx.hash);
            }
            self.note_state(&state);
            self.metrics.blocks_accepted.inc();
            drop(state);

            tracing::info!(hash = %block.hash, height = block.header.height, "block appended from peer");
            self.broadcaster.broadcast_block(&block, &hashes).await;
            return Ok(());
        }

        // Already known: duplicate.
        if state.chain.block_by_hash(&block.hash).is_some() {
            tracing::debug!(hash = %block.hash, "duplicate block");
            return Err(LedgerError::DuplicateBlock(block.hash.clone()).into());
        }

        // Neither tail nor known: a rival chain. Plan under the lock,
        // fetch what is missing from peers, then swap atomically.
        let Some(plan) = state.chain.plan_fork(&hashes)? else {
            drop(state);
            self.broadcaster.broadcast_block(&block, &hashes).await;
            return Ok(());
        };
        tracing::info!(
            ancestor = %plan.ancestor_hash,
            missing = plan.missing.len(),
            "rival chain is heavier, fetching fork"
        );

        let mut fetched = Vec::with_capacity(plan.missing.len());
        for hash in &plan.missing {
            if *hash == block.hash {
                fetched.push(block.clone());
                continue;
            }
            match self.broadcaster.request_block(hash).await {
                Some(b) => fetched.push(b),
                None => {
                    self.metrics.blocks_rejected.inc();
                    return Err(LedgerError::InvalidBlock(format!(
                        "fork block {hash} unavailable from peers"
                    ))
                    .into());
                }
            }
        }
        fetched.reverse();

        let adopted_tx_hashes: Vec<TxHash> = fetched
            .iter()
            .flat_map(|b| b.transactions.iter().map(|tx| tx.hash.clone()))
            .collect();

        let removed = state.chain.apply_fork(fetched)?;

        let state_ref = &mut *state;
        state_ref.mempool.readmit_stale(&removed, &state_ref.chain);
        for hash in &adopted_tx_hashes {
            state_ref.mempool.discard(hash);
        }
        self.note_state(&state);
        self.metrics.blocks_accepted.inc();
        self.metrics.reorgs.inc();
        drop(state);

        tracing::info!(hash = %block.hash, "fork resolved");
        self.broadcaster.broadcast_block(&block, &hashes).await;
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub async fn block_by_hash(&self, hash: &BlockHash) -> Option<Block> {
        let state = self.state.lock().await;
        state.chain.block_by_hash(hash).cloned()
    }

    /// Whether the transaction is `k`-confirmed, plus its current depth
    /// (-1 when absent).
    pub async fn transaction_status(&self, hash: &TxHash, k: i64) -> (bool, i64) {
        let state = self.state.lock().await;
        let depth = state.chain.tx_depth(hash);
        (depth >= k, depth)
    }

    pub async fn chain_height(&self) -> i32 {
        self.state.lock().await.chain.height()
    }

    /// Spendable total of an address, per the current UTXO index.
    pub async fn balance(&self, address: &naka_types::Address) -> i64 {
        self.state.lock().await.chain.utxo_index().balance(address)
    }

    pub async fn last_100_hashes(&self) -> Vec<BlockHash> {
        self.state.lock().await.chain.last_100_hashes()
    }

    /// Refresh the gauges that mirror the locked state.
    fn note_state(&self, state: &NodeState) {
        self.metrics.chain_height.set(state.chain.height() as i64);
        self.metrics.mempool_size.set(state.mempool.len() as i64);
    }

    // ── Mining control ──────────────────────────────────────────────────

    /// Start the mining task. Fails with `Busy` when one is running.
    pub async fn start_mining(self: &Arc<Self>) -> Result<(), NodeError> {
        if self
            .mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("mining already in progress");
            return Err(NodeError::Busy);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.miner_stop.lock().await = Some(stop_tx);
        let generation = self.miner_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _miner = miner::spawn(Arc::clone(self), stop_rx, generation);
        tracing::info!("mining started");
        Ok(())
    }

    /// Request the mining task to stop. Fails with `NotRunning` when idle.
    pub async fn stop_mining(&self) -> Result<(), NodeError> {
        let mut slot = self.miner_stop.lock().await;
        if !self.mining.load(Ordering::SeqCst) {
            tracing::debug!("mining not active");
            return Err(NodeError::NotRunning);
        }
        if let Some(stop_tx) = slot.take() {
            let _ = stop_tx.send(true);
        }
        self.mining.store(false, Ordering::SeqCst);
        tracing::info!("mining stop requested");
        Ok(())
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }

    /// Called by the mining task as it exits, however it exits. A stale
    /// task from a superseded session leaves the current one alone.
    pub(crate) async fn finish_mining(&self, generation: u64) {
        let mut slot = self.miner_stop.lock().await;
        if self.miner_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.mining.store(false, Ordering::SeqCst);
        *slot = None;
    }

    // ── Servers ─────────────────────────────────────────────────────────

    /// Bind and spawn the peer RPC server and the operator HTTP surface.
    pub async fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        let _rpc = crate::server::spawn_rpc_server(Arc::clone(self), self.config.rpc_port).await?;
        let _http = crate::http::spawn_http_server(Arc::clone(self), self.config.http_port).await?;
        Ok(())
    }

    /// Trigger shutdown and stop mining, ignoring an already-idle miner.
    pub async fn stop(&self) {
        match self.stop_mining().await {
            Ok(()) | Err(NodeError::NotRunning) => {}
            Err(e) => tracing::warn!(error = %e, "failed to stop miner"),
        }
        self.shutdown.shutdown();
    }
}
