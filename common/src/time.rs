//! Time utilities for ticker timestamps.

use chrono::{DateTime, TimeZone, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Build a timestamp from milliseconds since the Unix epoch.
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Build a timestamp from whole seconds since the Unix epoch.
pub fn from_unix_seconds(seconds: i64) -> Option<Timestamp> {
    seconds.checked_mul(1000).and_then(from_millis)
}
