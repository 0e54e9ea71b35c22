//! Difficulty target parsing and the proof-of-work acceptance test.

use num_bigint::BigUint;

/// Parse a lowercase-hex difficulty target into an integer.
///
/// Returns `None` for the empty string or non-hex input.
pub fn parse_target(hex: &str) -> Option<BigUint> {
    if hex.is_empty() {
        return None;
    }
    BigUint::parse_bytes(hex.as_bytes(), 16)
}

/// The sole proof-of-work acceptance test: the header hash, read as a hex
/// integer, must be strictly less than the target. There is no
/// leading-zeros convention.
///
/// Unparseable hashes or targets never satisfy the test.
pub fn hash_meets_target(hash_hex: &str, target_hex: &str) -> bool {
    let (Some(hash), Some(target)) = (parse_target(hash_hex), parse_target(target_hex)) else {
        return false;
    };
    hash < target
}
