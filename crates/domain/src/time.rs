//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for scene activation times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Default transition applied to device commands, in milliseconds.
pub const DEFAULT_TRANSITION_MS: u64 = 500;

/// Transition used for relative brightness adjustments, in milliseconds.
pub const ADJUST_TRANSITION_MS: u64 = 1000;
