//! Utility functions for time handling and run identifiers.

mod clock;
pub mod timestamps;
mod uuid_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use timestamps::{format_iso8601, is_sentinel, now_utc, sentinel_timestamp, Timestamp};
pub use uuid_utils::generate_run_id;
