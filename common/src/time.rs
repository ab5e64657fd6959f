//! Clocks.
//!
//! Scheduling math runs on integer milliseconds from a monotonic origin;
//! the wall clock is only used for log and snapshot timestamps.

use std::time::Instant;

use once_cell::sync::Lazy;

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since process start. Monotonic, never wraps in
/// practice (u64 ms ≈ 585 million years).
pub fn now_ms() -> u64 {
    ORIGIN.elapsed().as_millis() as u64
}

/// Wall-clock milliseconds since the Unix epoch, for human-facing
/// timestamps only.
pub fn wall_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
