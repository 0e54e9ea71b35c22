//! Consensus parameters shared by every node on the network.

use serde::{Deserialize, Serialize};

/// The fixed easy target used below the dynamic-difficulty start height:
/// 59 `f` nibbles, five short of a full 64-nibble digest.
pub const INITIAL_TARGET: &str = "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Default port of the peer RPC service.
pub const DEFAULT_RPC_PORT: u16 = 50051;

/// Parameters of the difficulty schedule and peer defaults.
///
/// Every node on a network must run the same values; there is no on-chain
/// negotiation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Desired seconds between blocks once difficulty is dynamic.
    pub target_block_time_secs: i64,

    /// Number of trailing blocks the retarget window looks at.
    pub difficulty_window: usize,

    /// Heights up to and including this one use [`INITIAL_TARGET`].
    pub dynamic_start_height: i32,

    /// Difficulty target for the fixed-difficulty phase, lowercase hex.
    pub initial_target: String,

    /// Port assumed for peer endpoints given without one.
    pub default_rpc_port: u16,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            target_block_time_secs: 20,
            difficulty_window: 10,
            dynamic_start_height: 1000,
            initial_target: INITIAL_TARGET.to_string(),
            default_rpc_port: DEFAULT_RPC_PORT,
        }
    }
}
