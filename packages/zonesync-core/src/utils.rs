//! General utilities shared across the engine.

use std::time::{SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Rounds a playback time in seconds to whole seconds.
///
/// Returns `None` for NaN or infinite values, which outputs report while a
/// source is still streaming in.
#[must_use]
pub fn round_seconds(seconds: f64) -> Option<f64> {
    let rounded = seconds.round();
    rounded.is_finite().then_some(rounded)
}

/// Formats a playback time as `m:ss`, or `h:mm:ss` from one hour upwards.
#[must_use]
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let minutes = total / 60;
    let minutes_and_seconds = format!("{}:{:02}", minutes % 60, total % 60);

    if minutes >= 60 {
        format!("{}:{:02}:{:02}", minutes / 60, minutes % 60, total % 60)
    } else {
        minutes_and_seconds
    }
}
