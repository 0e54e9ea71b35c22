//! Proof-of-work: difficulty targets, the adaptive retarget schedule, and
//! nonce sampling for the mining loop.

pub mod difficulty;
pub mod nonce;
pub mod target;

pub use difficulty::retarget;
pub use nonce::{sample_nonce, NONCE_SPACE};
pub use target::{hash_meets_target, parse_target};
