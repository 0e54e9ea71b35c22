//! Adaptive difficulty retargeting.
//!
//! The sum of reciprocal targets over the trailing window is proportional
//! to the expected number of hashes that window consumed. Dividing by the
//! elapsed time gives the observed hashrate; multiplying by the desired
//! block interval and inverting yields the target that would have produced
//! that interval at the observed rate. The arithmetic is exact rationals
//! throughout; floating point would let nodes disagree on the target.

use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::Zero;

use crate::target::parse_target;

/// Compute a new difficulty target from the trailing window.
///
/// `window_targets` are the hex targets of the window's blocks (zero or
/// unparseable entries are skipped, matching the schedule's treatment of
/// degenerate blocks); `total_time_ms` is the wall-clock span of the
/// window in milliseconds. Returns the new target as lowercase hex without
/// leading zeros, or `None` when the window is degenerate (no usable
/// targets, or under a second of elapsed time); the caller keeps the
/// previous target in that case.
pub fn retarget(
    window_targets: &[&str],
    total_time_ms: i64,
    target_block_time_secs: i64,
) -> Option<String> {
    // Millisecond span truncated to whole seconds before entering the
    // rational arithmetic; the schedule is defined over seconds.
    let total_secs = total_time_ms / 1000;
    if total_secs <= 0 {
        return None;
    }

    let mut sum_inv = BigRational::zero();
    for hex in window_targets {
        let Some(target) = parse_target(hex) else {
            continue;
        };
        if target.is_zero() {
            continue;
        }
        let denom = BigInt::from_biguint(Sign::Plus, target);
        sum_inv += BigRational::new(BigInt::from(1), denom);
    }
    if sum_inv.is_zero() {
        return None;
    }

    let rate = sum_inv / BigRational::from_integer(BigInt::from(total_secs));
    let adjusted = rate * BigRational::from_integer(BigInt::from(target_block_time_secs));
    let new_target = adjusted.recip().floor().to_integer();

    Some(new_target.to_str_radix(16))
}
