//! Time utilities.
//!
//! All persisted timestamps are milliseconds since the Unix epoch, matching
//! what SQLite computes for column defaults and the `updated_at` trigger.

use chrono::{DateTime, Utc};

/// Current wall-clock time in milliseconds.
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp for humans (`YYYY-MM-DD HH:MM:SS`, UTC).
pub fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
