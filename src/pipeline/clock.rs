//! Media clock for capture timestamps

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::time::Instant;

use super::types::Timestamp;

/// Media clock for timestamp correlation
///
/// Every run gets its own clock. Capture timestamps are taken relative to the
/// clock base and are strictly increasing: two captures landing in the same
/// microsecond are separated by one tick.
///
/// # Thread Safety
///
/// The clock is cheap to clone; clones share the same base and counter.
#[derive(Clone)]
pub struct MediaClock {
    /// Base instant when the clock started
    base: Instant,

    /// Last timestamp handed out by `next_capture_timestamp`
    last_capture: Arc<AtomicI64>,
}

impl MediaClock {
    /// Create a new media clock starting now
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            last_capture: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// Get the current timestamp
    pub fn now(&self) -> Timestamp {
        Timestamp::from_instant(Instant::now(), self.base)
    }

    /// Timestamp for a captured frame, strictly greater than any previous one.
    pub fn next_capture_timestamp(&self) -> Timestamp {
        let now = self.now().micros;
        let mut prev = self.last_capture.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_capture.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Timestamp::from_micros(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

impl std::fmt::Debug for MediaClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClock")
            .field("elapsed", &self.base.elapsed())
            .field("last_capture", &self.last_capture.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_clock_basic() {
        let clock = MediaClock::new();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ts = clock.now();
        assert!(ts.micros >= 10_000 && ts.micros < 11_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_timestamps_strictly_increase() {
        let clock = MediaClock::new();

        // Time does not advance between calls while paused.
        let a = clock.next_capture_timestamp();
        let b = clock.next_capture_timestamp();
        let c = clock.next_capture_timestamp();
        assert!(a < b && b < c);

        tokio::time::sleep(Duration::from_millis(1)).await;
        let d = clock.next_capture_timestamp();
        assert!(d.micros >= 1_000);
    }
}
