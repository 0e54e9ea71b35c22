//! Prometheus metrics for the node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] that the operator HTTP
//! surface encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transactions accepted into the mempool.
    pub transactions_accepted: IntCounter,
    /// Transactions rejected at submission.
    pub transactions_rejected: IntCounter,
    /// Blocks accepted from peers.
    pub blocks_accepted: IntCounter,
    /// Blocks rejected (invalid, duplicate, unlinkable).
    pub blocks_rejected: IntCounter,
    /// Blocks mined locally.
    pub blocks_mined: IntCounter,
    /// Chain reorganizations performed.
    pub reorgs: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Height of the chain tail.
    pub chain_height: IntGauge,
    /// Transactions currently pooled.
    pub mempool_size: IntGauge,
    /// Registered peers.
    pub peer_count: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transactions_accepted = register_int_counter_with_registry!(
            Opts::new("naka_transactions_accepted_total", "Transactions accepted"),
            registry
        )
        .expect("failed to register transactions_accepted counter");

        let transactions_rejected = register_int_counter_with_registry!(
            Opts::new("naka_transactions_rejected_total", "Transactions rejected"),
            registry
        )
        .expect("failed to register transactions_rejected counter");

        let blocks_accepted = register_int_counter_with_registry!(
            Opts::new("naka_blocks_accepted_total", "Blocks accepted from peers"),
            registry
        )
        .expect("failed to register blocks_accepted counter");

        let blocks_rejected = register_int_counter_with_registry!(
            Opts::new("naka_blocks_rejected_total", "Blocks rejected"),
            registry
        )
        .expect("failed to register blocks_rejected counter");

        let blocks_mined = register_int_counter_with_registry!(
            Opts::new("naka_blocks_mined_total", "Blocks mined locally"),
            registry
        )
        .expect("failed to register blocks_mined counter");

        let reorgs = register_int_counter_with_registry!(
            Opts::new("naka_reorgs_total", "Chain reorganizations"),
            registry
        )
        .expect("failed to register reorgs counter");

        let chain_height = register_int_gauge_with_registry!(
            Opts::new("naka_chain_height", "Height of the chain tail"),
            registry
        )
        .expect("failed to register chain_height gauge");

        let mempool_size = register_int_gauge_with_registry!(
            Opts::new("naka_mempool_size", "Transactions currently pooled"),
            registry
        )
        .expect("failed to register mempool_size gauge");

        let peer_count = register_int_gauge_with_registry!(
            Opts::new("naka_peer_count", "Registered peers"),
            registry
        )
        .expect("failed to register peer_count gauge");

        Self {
            registry,
            transactions_accepted,
            transactions_rejected,
            blocks_accepted,
            blocks_rejected,
            blocks_mined,
            reorgs,
            chain_height,
            mempool_size,
            peer_count,
        }
    }

    /// Encode every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = NodeMetrics::new();
        metrics.blocks_mined.inc();
        metrics.blocks_mined.inc();
        assert_eq!(metrics.blocks_mined.get(), 2);
    }

    #[test]
    fn encode_contains_metric_names() {
        let metrics = NodeMetrics::new();
        metrics.chain_height.set(7);
        let text = metrics.encode().unwrap();
        assert!(text.contains("naka_chain_height 7"));
        assert!(text.contains("naka_blocks_mined_total"));
    }
}
