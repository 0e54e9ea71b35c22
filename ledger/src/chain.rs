//! The main chain: an ordered block sequence plus the UTXO index it
//! induces, with the difficulty schedule and fork resolution.

use naka_types::{BlockHash, ConsensusParams, TxHash};
use naka_work::retarget;

use crate::block::Block;
use crate::error::LedgerError;
use crate::transaction::Transaction;
use crate::utxo::{Utxo, UtxoIndex};

/// How many tail hashes a node shares when announcing a block.
const ANNOUNCED_HASHES: usize = 100;

/// The plan produced by [`Chain::plan_fork`] when a rival chain is
/// strictly heavier: which blocks to fetch, in fetch order (tail first,
/// walking back toward the ancestor).
#[derive(Clone, Debug)]
pub struct ForkPlan {
    pub ancestor_hash: BlockHash,
    pub ancestor_height: i32,
    pub missing: Vec<BlockHash>,
}

pub struct Chain {
    blocks: Vec<Block>,
    utxo_index: UtxoIndex,
    params: ConsensusParams,
}

impl Chain {
    /// Seed the UTXO index and install the genesis block.
    pub fn new(initial_utxos: Vec<Utxo>, params: ConsensusParams) -> Result<Self, LedgerError> {
        let mut utxo_index = UtxoIndex::new();
        for utxo in initial_utxos {
            utxo_index.add(utxo);
        }

        let genesis = Block::genesis(params.initial_target.clone())?;
        tracing::info!(hash = %genesis.hash, "genesis block installed");

        Ok(Self {
            blocks: vec![genesis],
            utxo_index,
            params,
        })
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn last_block(&self) -> &Block {
        self.blocks.last().expect("chain always contains genesis")
    }

    /// Height of the tail block.
    pub fn height(&self) -> i32 {
        self.last_block().header.height
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true: the genesis block is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn block_by_height(&self, height: i32) -> Option<&Block> {
        if height < 0 {
            return None;
        }
        self.blocks.get(height as usize)
    }

    pub fn block_by_hash(&self, hash: &BlockHash) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == *hash)
    }

    pub fn has_tx(&self, hash: &TxHash) -> bool {
        self.blocks
            .iter()
            .any(|b| b.transactions.iter().any(|tx| tx.hash == *hash))
    }

    /// Number of blocks at or above the block containing the transaction,
    /// or -1 when the transaction is not in the chain. Searched from the
    /// tail: recent transactions are the common case.
    pub fn tx_depth(&self, hash: &TxHash) -> i64 {
        for (i, block) in self.blocks.iter().enumerate().rev() {
            if block.transactions.iter().any(|tx| tx.hash == *hash) {
                return (self.blocks.len() - i) as i64;
            }
        }
        -1
    }

    /// Hashes of the trailing (up to) 100 blocks, ascending by height.
    pub fn last_100_hashes(&self) -> Vec<BlockHash> {
        let start = self.blocks.len().saturating_sub(ANNOUNCED_HASHES);
        self.blocks[start..].iter().map(|b| b.hash.clone()).collect()
    }

    pub fn utxo_index(&self) -> &UtxoIndex {
        &self.utxo_index
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    // ── Difficulty schedule ─────────────────────────────────────────────

    /// The difficulty target for a block arriving at `height`.
    ///
    /// Fixed at the initial target up to and including the dynamic-start
    /// height; above that, retargeted from the trailing window. A
    /// degenerate window keeps the previous block's target.
    pub fn difficulty_for(&self, height: i32) -> String {
        if height <= self.params.dynamic_start_height {
            return self.params.initial_target.clone();
        }

        // The schedule is only defined up to the next height.
        let h = (height as usize).min(self.blocks.len());
        let start = h.saturating_sub(self.params.difficulty_window).max(2);

        let total_time_ms =
            self.blocks[h - 1].header.timestamp - self.blocks[start - 1].header.timestamp;
        let window_targets: Vec<&str> = self.blocks[start..h]
            .iter()
            .map(|b| b.header.difficulty.as_str())
            .collect();

        match retarget(
            &window_targets,
            total_time_ms,
            self.params.target_block_time_secs,
        ) {
            Some(target) => {
                tracing::info!(height, target = %target, "difficulty retargeted");
                target
            }
            None => {
                tracing::warn!(height, "degenerate retarget window, keeping previous target");
                self.blocks[h - 1].header.difficulty.clone()
            }
        }
    }

    // ── Growth ──────────────────────────────────────────────────────────

    /// Assemble a mining candidate on the current tail: previous hash and
    /// next height copied, current difficulty applied, nonce left at zero
    /// for the caller to search.
    pub fn create_block(&self, transactions: Vec<Transaction>) -> Result<Block, LedgerError> {
        let height = self.blocks.len() as i32;
        Block::new(
            self.last_block().hash.clone(),
            height,
            self.difficulty_for(height),
            transactions,
        )
    }

    /// Verify a block, check it extends the tail, fold it into the UTXO
    /// index, and append it. Fails atomically.
    pub fn add_block(&mut self, block: Block) -> Result<(), LedgerError> {
        if !block.verify() {
            return Err(LedgerError::InvalidBlock(format!(
                "block {} failed verification",
                block.hash
            )));
        }

        let tail = self.last_block();
        if block.header.previous_hash != tail.hash {
            return Err(LedgerError::InvalidBlock(format!(
                "previous hash mismatch at height {}",
                block.header.height
            )));
        }
        if block.header.height != tail.header.height + 1 {
            return Err(LedgerError::InvalidBlock(format!(
                "height mismatch: got {}, expected {}",
                block.header.height,
                tail.header.height + 1
            )));
        }

        self.utxo_index.apply_block(&block)?;

        tracing::debug!(
            height = block.header.height,
            hash = %block.hash,
            transactions = block.transactions.len(),
            "block appended"
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Full-chain audit: heights, links, the difficulty schedule, and each
    /// block's own validity.
    pub fn verify_chain(&self) -> bool {
        let mut previous_hash = BlockHash::none();
        for (i, block) in self.blocks.iter().enumerate() {
            if block.header.height != i as i32 {
                return false;
            }
            if block.header.previous_hash != previous_hash {
                return false;
            }
            if block.header.difficulty != self.difficulty_for(i as i32) {
                return false;
            }
            if !block.verify() {
                return false;
            }
            previous_hash = block.hash.clone();
        }
        true
    }

    // ── Fork resolution ─────────────────────────────────────────────────

    /// The local block of greatest height whose hash also appears in the
    /// incoming list.
    pub fn find_common_ancestor(&self, incoming: &[BlockHash]) -> Option<&Block> {
        let mut best: Option<&Block> = None;
        for hash in incoming {
            if let Some(block) = self.block_by_hash(hash) {
                if best.map_or(true, |b| block.header.height > b.header.height) {
                    best = Some(block);
                }
            }
        }
        best
    }

    /// Assess an announced rival chain.
    ///
    /// Work is measured as the count of hashes above the common ancestor on
    /// each side. (This ignores per-block difficulty; summing reciprocal
    /// targets over each branch would weigh heterogeneous-difficulty forks
    /// correctly.) Returns `Ok(None)` when the rival is not strictly
    /// heavier, a fetch plan when it is, and `NoCommonAncestor` when the
    /// two chains share no block.
    pub fn plan_fork(&self, incoming: &[BlockHash]) -> Result<Option<ForkPlan>, LedgerError> {
        let ancestor = self
            .find_common_ancestor(incoming)
            .ok_or(LedgerError::NoCommonAncestor)?;
        let ancestor_hash = ancestor.hash.clone();
        let ancestor_height = ancestor.header.height;

        let ancestor_pos = incoming
            .iter()
            .position(|h| *h == ancestor_hash)
            .ok_or(LedgerError::NoCommonAncestor)?;

        let local_work = self.blocks.len() - 1 - ancestor_height as usize;
        let fork_work = incoming.len() - ancestor_pos - 1;
        tracing::debug!(local_work, fork_work, ancestor = %ancestor_hash, "comparing fork work");

        if fork_work <= local_work {
            return Ok(None);
        }

        // Walk the announced hashes from the tail back toward the ancestor,
        // skipping any block already present locally.
        let missing: Vec<BlockHash> = incoming[ancestor_pos + 1..]
            .iter()
            .rev()
            .filter(|h| self.block_by_hash(h).is_none())
            .cloned()
            .collect();

        Ok(Some(ForkPlan {
            ancestor_hash,
            ancestor_height,
            missing,
        }))
    }

    /// Pop blocks off the tail until it is the block with the given hash,
    /// reverting each from the UTXO index. Returns the removed blocks,
    /// tail first. Fails atomically.
    pub fn rollback_to(&mut self, hash: &BlockHash) -> Result<Vec<Block>, LedgerError> {
        let target = self
            .blocks
            .iter()
            .position(|b| b.hash == *hash)
            .ok_or_else(|| LedgerError::NotFound(format!("rollback target {hash}")))?;

        let mut removed = Vec::new();
        while self.blocks.len() - 1 > target {
            let tail = self.blocks[self.blocks.len() - 1].clone();
            if let Err(e) = self.utxo_index.revert_block(&tail) {
                // Restore what was already popped before reporting.
                for block in removed.into_iter().rev() {
                    if let Err(undo) = self.utxo_index.apply_block(&block) {
                        tracing::error!(error = %undo, "failed to restore chain during rollback abort");
                    } else {
                        self.blocks.push(block);
                    }
                }
                return Err(e);
            }
            self.blocks.pop();
            removed.push(tail);
        }

        tracing::info!(
            to = %hash,
            removed = removed.len(),
            "chain rolled back"
        );
        Ok(removed)
    }

    /// Replace the tail with a fully fetched fork: validate the sequence,
    /// roll back to the common ancestor, and append. `fork_blocks` must be
    /// ancestor-first. Returns the blocks removed from the local chain.
    /// Any failure leaves the chain untouched.
    pub fn apply_fork(&mut self, fork_blocks: Vec<Block>) -> Result<Vec<Block>, LedgerError> {
        let Some(first) = fork_blocks.first() else {
            return Err(LedgerError::InvalidBlock("empty fork".to_string()));
        };

        let ancestor_hash = first.header.previous_hash.clone();
        let ancestor = self
            .block_by_hash(&ancestor_hash)
            .ok_or(LedgerError::NoCommonAncestor)?;
        let ancestor_height = ancestor.header.height;

        // Validate the whole sequence before mutating anything.
        let mut previous_hash = ancestor_hash.clone();
        for (i, block) in fork_blocks.iter().enumerate() {
            if !block.verify() {
                return Err(LedgerError::InvalidBlock(format!(
                    "fork block {} failed verification",
                    block.hash
                )));
            }
            if block.header.previous_hash != previous_hash {
                return Err(LedgerError::InvalidBlock(format!(
                    "fork link broken at {}",
                    block.hash
                )));
            }
            if block.header.height != ancestor_height + 1 + i as i32 {
                return Err(LedgerError::InvalidBlock(format!(
                    "fork height mismatch at {}",
                    block.hash
                )));
            }
            previous_hash = block.hash.clone();
        }

        let removed = self.rollback_to(&ancestor_hash)?;

        for block in fork_blocks {
            let hash = block.hash.clone();
            if let Err(e) = self.add_block(block) {
                tracing::warn!(hash = %hash, error = %e, "fork application failed, restoring local chain");
                if let Err(undo) = self.rollback_to(&ancestor_hash) {
                    tracing::error!(error = %undo, "failed to unwind partial fork");
                }
                for original in removed.into_iter().rev() {
                    if let Err(undo) = self.add_block(original) {
                        tracing::error!(error = %undo, "failed to restore rolled-back block");
                    }
                }
                return Err(e);
            }
        }

        tracing::info!(
            height = self.height(),
            tail = %self.last_block().hash,
            "adopted heavier fork"
        );
        Ok(removed)
    }

    /// Resolve a rival chain in one call: plan, fetch through the given
    /// callback, validate, and swap. Returns the blocks removed from the
    /// local chain (the coordinator readmits their transactions), empty
    /// when the rival was not heavier. Fails atomically.
    pub fn handle_fork<F>(
        &mut self,
        incoming: &[BlockHash],
        mut request_block: F,
    ) -> Result<Vec<Block>, LedgerError>
    where
        F: FnMut(&BlockHash) -> Option<Block>,
    {
        let Some(plan) = self.plan_fork(incoming)? else {
            tracing::debug!("local chain is at least as heavy, nothing to do");
            return Ok(Vec::new());
        };

        let mut fetched = Vec::with_capacity(plan.missing.len());
        for hash in &plan.missing {
            match request_block(hash) {
                Some(block) => fetched.push(block),
                None => {
                    return Err(LedgerError::InvalidBlock(format!(
                        "fork block {hash} unavailable from peers"
                    )))
                }
            }
        }
        fetched.reverse();

        self.apply_fork(fetched)
    }
}
