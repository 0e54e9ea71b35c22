//! The peer fabric: wire messages, framed point-to-point channels, the
//! peer registry with its blacklist, and best-effort broadcast fan-out.

pub mod broadcast;
pub mod channel;
pub mod error;
pub mod registry;
pub mod wire;

pub use broadcast::{BroadcastResult, Broadcaster};
pub use channel::{read_frame, write_frame, PeerChannel, CALL_DEADLINE, MAX_FRAME_SIZE};
pub use error::NetworkError;
pub use registry::PeerRegistry;
pub use wire::{RpcRequest, RpcResponse, WireBlock, WireTransaction, WireUtxo};
