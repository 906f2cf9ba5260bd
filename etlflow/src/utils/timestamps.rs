//! Timestamp helpers shared by the tracking store and the pipeline runner.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Seconds from 0001-01-01T00:00:00Z to the Unix epoch.
const SENTINEL_UNIX_SECONDS: i64 = -62_135_596_800;

/// Returns the "never happened" timestamp, `0001-01-01T00:00:00Z`.
///
/// Fresh tracking records carry this value in both time fields.
#[must_use]
pub fn sentinel_timestamp() -> Timestamp {
    DateTime::from_timestamp(SENTINEL_UNIX_SECONDS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Returns true if the timestamp is the sentinel value.
#[must_use]
pub fn is_sentinel(ts: &Timestamp) -> bool {
    *ts == sentinel_timestamp()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as an RFC 3339 string with microsecond precision.
///
/// # Examples
///
/// ```
/// use etlflow::utils::{format_iso8601, sentinel_timestamp};
///
/// assert_eq!(format_iso8601(&sentinel_timestamp()), "0001-01-01T00:00:00.000000+00:00");
/// ```
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}
