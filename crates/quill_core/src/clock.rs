//! Wall-clock helpers. All persisted timestamps are Unix epoch milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Deadline `ttl` after `now`, saturating instead of overflowing.
pub fn deadline_after(now: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(ttl_ms)
}
