//! Nonce sampling for the mining loop.
//!
//! Nonces are drawn uniformly at random from a large fixed range rather
//! than counted up, so independent miners working on the same candidate do
//! not retrace each other's search path.

use rand::Rng;

/// Exclusive upper bound of the nonce search space: 10^11.
pub const NONCE_SPACE: i64 = 100_000_000_000;

/// Draw one candidate nonce from `[0, NONCE_SPACE)`.
pub fn sample_nonce<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    rng.gen_range(0..NONCE_SPACE)
}
