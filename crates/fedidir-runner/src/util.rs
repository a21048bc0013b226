use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in Unix millis, the unit crawl timestamps are stored in.
pub fn now_millis() -> i64 {
    let dur = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(dur.as_millis()).unwrap_or(i64::MAX)
}
