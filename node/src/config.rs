//! Node configuration and startup file loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use naka_crypto::derive_address;
use naka_ledger::Utxo;
use naka_types::{ConsensusParams, PublicKey, TxHash};

use crate::error::NodeError;

/// Configuration for one node.
///
/// Built from positional CLI arguments by the daemon, from a TOML file via
/// [`NodeConfig::from_toml_file`], or programmatically (tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Path to the initial-UTXO seed file.
    #[serde(default)]
    pub utxo_file: PathBuf,

    /// Port of the operator HTTP surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port of the peer RPC service.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Miner behavior-injection flag (0 = honest). See [`crate::MinerMode`].
    #[serde(default)]
    pub mode: u8,

    /// Peer endpoints to register at startup.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Consensus parameters (fixed per network, not read from TOML).
    #[serde(skip)]
    pub params: ConsensusParams,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds the miner waits for an applicable transaction before it
    /// assembles an empty candidate.
    #[serde(default = "default_empty_block_grace")]
    pub empty_block_grace_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_http_port() -> u16 {
    8080
}

fn default_rpc_port() -> u16 {
    naka_types::params::DEFAULT_RPC_PORT
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_empty_block_grace() -> u64 {
    30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            utxo_file: PathBuf::new(),
            http_port: default_http_port(),
            rpc_port: default_rpc_port(),
            mode: 0,
            peers: Vec::new(),
            params: ConsensusParams::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            empty_block_grace_secs: default_empty_block_grace(),
        }
    }
}

// ── Seed file ──────────────────────────────────────────────────────────

/// One entry of the initial-UTXO file: a public key and the outputs it
/// owns.
#[derive(Debug, Deserialize)]
struct SeedEntry {
    public_key: String,
    utxos: Vec<SeedUtxo>,
}

/// Outputs in the seed file carry the generator's field names.
#[derive(Debug, Deserialize)]
struct SeedUtxo {
    #[serde(rename = "TxID")]
    tx_id: String,
    #[serde(rename = "Index")]
    index: i32,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "Address", default)]
    _address: String,
}

/// Load the initial-UTXO seed file.
///
/// Each output's address is stamped from its entry's public key at load;
/// whatever address the file carries is ignored.
pub fn load_seed_utxos(path: &Path) -> Result<Vec<Utxo>, NodeError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("cannot read UTXO file {}: {e}", path.display())))?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&content)
        .map_err(|e| NodeError::Config(format!("cannot parse UTXO file: {e}")))?;

    let mut utxos = Vec::new();
    for entry in entries {
        let address = derive_address(&PublicKey::new(&entry.public_key))
            .map_err(|e| NodeError::Config(format!("bad public key in UTXO file: {e}")))?;
        for seed in entry.utxos {
            utxos.push(Utxo {
                tx_hash: TxHash::new(seed.tx_id),
                index: seed.index,
                amount: seed.amount,
                address: address.clone(),
            });
        }
    }
    tracing::info!(count = utxos.len(), file = %path.display(), "initial UTXOs loaded");
    Ok(utxos)
}

/// Load a peers file: one `host[:port]` endpoint per line, `#` comments
/// and blank lines skipped.
pub fn load_peers_file(path: &Path) -> Result<Vec<String>, NodeError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NodeError::Config(format!("cannot read peers file {}: {e}", path.display()))
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
