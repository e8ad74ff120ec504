use chrono::{DateTime, Utc};

/// Milliseconds since the unix epoch, the representation used for heartbeat timestamps.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
