//! Time primitives: millisecond timestamps and order timeouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The system-wide maximum order timeout, in seconds (one day).
pub const MAX_ORDER_TIMEOUT: u64 = 24 * 60 * 60;

/// Get the current time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A point in time, expressed as milliseconds since the Unix epoch.
///
/// All wire messages and orders carry timestamps in this form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Timestamp(current_time_millis())
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Timestamp(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated order lifetime, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout(u64);

impl Timeout {
    /// Create a timeout of `seconds`.
    pub fn new(seconds: u64) -> Self {
        Timeout(seconds)
    }

    /// The timeout in seconds.
    pub fn seconds(self) -> u64 {
        self.0
    }

    /// Whether the timeout has elapsed since `since`.
    pub fn is_timed_out(self, since: Timestamp) -> bool {
        current_time_millis().saturating_sub(since.millis()) >= self.0 * 1000
    }
}

impl From<u64> for Timeout {
    fn from(seconds: u64) -> Self {
        Timeout(seconds)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
