//! Time helpers.
//!
//! All protocol timestamps are milliseconds since the UNIX epoch, carried
//! as `i64` in headers and transactions.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in milliseconds.
pub fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
