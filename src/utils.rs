//! Small time helpers shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Milliseconds since the epoch as fractional seconds, the unit used by the
/// wire-stable snapshot format.
pub fn millis_to_secs_f64(millis: u64) -> f64 {
    millis as f64 / 1_000.0
}
