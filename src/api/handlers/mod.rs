//! API handlers and shared utilities for Verimail.

pub mod auth;
pub mod health;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix seconds; `0` if the clock is before the epoch.
pub(crate) fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
