//! Time sources shared by the workers and the sampler.
//!
//! Interval boundaries are wall-clock milliseconds, operation durations are
//! monotonic nanoseconds measured from a process-wide anchor.

use std::sync::OnceLock;
use std::time::Instant;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the Unix epoch.
pub fn wall_clock_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Nanoseconds elapsed since the first call in this process.
pub fn monotonic_nanos() -> u64 {
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}
