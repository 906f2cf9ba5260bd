//! Run identifiers.

use uuid::Uuid;

/// Generates a new UUID v4 used to correlate the log lines of one run.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
