//! The mining loop: candidate assembly, nonce search, commit, broadcast,
//! plus the operator misbehavior modes used to exercise peers.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use naka_ledger::Block;
use naka_types::{BlockHash, TxHash};
use naka_work::sample_nonce;

use crate::node::Node;

/// Transactions packed per block.
const MAX_BLOCK_TXS: usize = 1;

/// Nonce attempts between tail-advancement checks.
const NONCE_BATCH: u64 = 10_000;

/// Sleep between mempool polls and between outer loop iterations.
const POOL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Heights a mode-3 miner keeps to itself (and swallows from peers).
pub(crate) const WITHHOLD_HEIGHTS: Range<i32> = 1..5;

/// Height at which a mode-3 miner stops.
const WITHHOLD_STOP_HEIGHT: i32 = 10;

/// Behavior-injection flag selected at startup. Anything but `Honest`
/// exists to feed peers untrusted artifacts in tests; correct peers must
/// reject them all the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinerMode {
    /// Mine and broadcast honestly.
    Honest,
    /// Corrupt the first transaction hash of the first mined block, then
    /// stop.
    CorruptFirstTx,
    /// Publish one block with a fabricated hash and nonce, then stop.
    FakeHashOnce,
    /// Withhold blocks at heights 1–4, broadcast from height 5 on, stop
    /// at height 10.
    Withhold,
    /// Publish fabricated hashes indefinitely.
    FakeHashForever,
}

impl MinerMode {
    /// Decode the startup flag; unknown values fall back to honest.
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            0 => Self::Honest,
            1 => Self::CorruptFirstTx,
            2 => Self::FakeHashOnce,
            3 => Self::Withhold,
            4 => Self::FakeHashForever,
            other => {
                tracing::warn!(flag = other, "unknown miner mode, running honest");
                Self::Honest
            }
        }
    }
}

/// Spawn the mining task. The task ends when the stop signal or node
/// shutdown fires, or when its mode's stop rule triggers; either way it
/// clears the node's mining flag on the way out.
pub(crate) fn spawn(
    node: Arc<Node>,
    stop_rx: watch::Receiver<bool>,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        mine_loop(&node, stop_rx).await;
        node.finish_mining(generation).await;
        tracing::info!("mining stopped");
    })
}

async fn mine_loop(node: &Arc<Node>, mut stop_rx: watch::Receiver<bool>) {
    let mode = node.mode();
    let mut shutdown_rx = node.shutdown.subscribe();
    let mut rng = StdRng::from_entropy();

    'outer: loop {
        // The stop signal is honored once per outer iteration.
        if *stop_rx.borrow() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(POOL_POLL_INTERVAL) => {}
            _ = stop_rx.changed() => return,
            _ = shutdown_rx.recv() => return,
        }

        let Some(mut block) = assemble_candidate(node, &mut stop_rx).await else {
            return;
        };

        // Nonce search, outside every lock. Between batches, bail out on
        // stop and reassemble when the tail moved.
        let found: BlockHash;
        'search: loop {
            for _ in 0..NONCE_BATCH {
                block.header.nonce = sample_nonce(&mut rng);
                let Ok(hash) = block.header_hash() else {
                    tracing::error!("header hashing failed, reassembling");
                    continue 'outer;
                };
                if block.hash_meets_difficulty(&hash) {
                    found = hash;
                    break 'search;
                }
            }
            if *stop_rx.borrow() {
                return;
            }
            {
                let state = node.state().lock().await;
                if state.chain.height() >= block.header.height {
                    tracing::debug!(
                        height = block.header.height,
                        "chain advanced during nonce search, reassembling"
                    );
                    continue 'outer;
                }
            }
            tokio::task::yield_now().await;
        }
        block.hash = found;
        tracing::debug!(
            height = block.header.height,
            nonce = block.header.nonce,
            hash = %block.hash,
            "nonce found"
        );

        // Behavior injection happens between sealing and commit.
        match mode {
            MinerMode::CorruptFirstTx => {
                if let Some(tx) = block.transactions.first_mut() {
                    tx.hash = TxHash::from("0");
                    tracing::info!(height = block.header.height, "corrupted first transaction hash");
                }
            }
            MinerMode::FakeHashOnce | MinerMode::FakeHashForever => {
                block.hash = BlockHash::from("1");
                block.header.nonce = 1;
                tracing::info!(height = block.header.height, "publishing fabricated block hash");
            }
            MinerMode::Honest | MinerMode::Withhold => {}
        }

        // Commit under the state lock; the tail may have moved since the
        // last batch check.
        let announce_hashes: Vec<BlockHash>;
        {
            let mut state = node.state().lock().await;
            if state.chain.height() >= block.header.height {
                tracing::debug!(height = block.header.height, "chain advanced before commit, restarting");
                continue 'outer;
            }
            match state.chain.add_block(block.clone()) {
                Ok(()) => {
                    for tx in &block.transactions {
                        state.mempool.discard(&tx.hash);
                    }
                    announce_hashes = state.chain.last_100_hashes();
                    node.metrics.blocks_mined.inc();
                    node.metrics.chain_height.set(state.chain.height() as i64);
                    node.metrics.mempool_size.set(state.mempool.len() as i64);
                    tracing::info!(
                        height = block.header.height,
                        hash = %block.hash,
                        transactions = block.transactions.len(),
                        "block mined"
                    );
                }
                Err(e) if mode == MinerMode::Honest => {
                    tracing::error!(error = %e, "failed to commit mined block");
                    continue 'outer;
                }
                Err(e) => {
                    // Misbehaving modes publish artifacts the local chain
                    // itself refuses; peers get them anyway.
                    tracing::debug!(error = %e, "local chain rejected tampered block");
                    announce_hashes = state.chain.last_100_hashes();
                }
            }
        }

        let withheld =
            mode == MinerMode::Withhold && WITHHOLD_HEIGHTS.contains(&block.header.height);
        if withheld {
            tracing::info!(height = block.header.height, "block withheld from peers");
        } else {
            node.broadcaster()
                .broadcast_block(&block, &announce_hashes)
                .await;
        }

        match mode {
            MinerMode::CorruptFirstTx | MinerMode::FakeHashOnce => return,
            MinerMode::Withhold if block.header.height >= WITHHOLD_STOP_HEIGHT => return,
            _ => {}
        }
    }
}

/// Wait for an applicable transaction, polling the pool once a second.
///
/// After the configured grace period an empty candidate is assembled
/// instead: empty blocks keep the chain advancing when traffic stops,
/// which fork resolution and retargeting both rely on. Returns `None`
/// when the stop signal fires while waiting.
async fn assemble_candidate(
    node: &Arc<Node>,
    stop_rx: &mut watch::Receiver<bool>,
) -> Option<Block> {
    let grace_polls = node.config().empty_block_grace_secs;
    let mut polls = 0u64;

    loop {
        if *stop_rx.borrow() {
            return None;
        }
        {
            let state = node.state().lock().await;
            let txs = state
                .mempool
                .select_up_to(MAX_BLOCK_TXS, state.chain.utxo_index());
            if !txs.is_empty() || polls >= grace_polls {
                match state.chain.create_block(txs) {
                    Ok(block) => {
                        tracing::debug!(
                            height = block.header.height,
                            transactions = block.transactions.len(),
                            "candidate assembled"
                        );
                        return Some(block);
                    }
                    Err(e) => tracing::error!(error = %e, "candidate assembly failed"),
                }
            }
        }
        polls += 1;
        tokio::select! {
            _ = tokio::time::sleep(POOL_POLL_INTERVAL) => {}
            _ = stop_rx.changed() => return None,
        }
    }
}
