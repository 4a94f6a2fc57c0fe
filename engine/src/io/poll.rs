//! Bounded polling for replies that arrive asynchronously.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::trace;

/// Call `probe` every `interval` until it yields a value or `deadline` passes.
///
/// Returns `Ok(None)` when the deadline passes first. `probe` always runs at
/// least once.
pub fn poll_until<T>(
    deadline: Instant,
    interval: Duration,
    mut probe: impl FnMut() -> Result<Option<T>>,
) -> Result<Option<T>> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if let Some(found) = probe()? {
            trace!(attempts, "poll satisfied");
            return Ok(Some(found));
        }
        let now = Instant::now();
        if now >= deadline {
            trace!(attempts, "poll deadline passed");
            return Ok(None);
        }
        thread::sleep(interval.min(deadline - now));
    }
}
