//! Injectable time source.
//!
//! The engine never reads the wall clock itself. Every tick is handed a
//! timestamp from a [`Clock`], so tests drive rounds with [`ManualClock`]
//! instead of waiting in real time.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current timestamp.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock that only moves when told to.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Move time forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clock anchored to a wall-clock reading and advanced by tokio's monotonic
/// timer.
///
/// Wall-clock steps after construction do not affect it, and under a paused
/// tokio runtime it follows virtual time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchor at `origin`.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.started.elapsed()).unwrap_or_else(|_| Duration::zero());
        self.origin + elapsed
    }
}

/// Elapsed time between two timestamps, clamped at zero.
///
/// A clock that steps backwards yields zero rather than a negative span.
pub fn elapsed_between(from: DateTime<Utc>, to: DateTime<Utc>) -> std::time::Duration {
    (to - from).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();

        clock.advance_ms(1500);
        assert_eq!((clock.now() - start).num_milliseconds(), 1500);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::at_epoch();
        let other = clock.clone();

        clock.advance_ms(250);
        assert_eq!(clock.now(), other.now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_virtual_time() {
        let clock = TokioClock::starting_at(ManualClock::at_epoch().now());
        let start = clock.now();

        tokio::time::sleep(std::time::Duration::from_millis(750)).await;
        assert_eq!((clock.now() - start).num_milliseconds(), 750);
    }

    #[test]
    fn test_elapsed_clamps_negative() {
        let clock = ManualClock::at_epoch();
        let later = clock.now() + Duration::seconds(3);

        assert_eq!(elapsed_between(later, clock.now()), std::time::Duration::ZERO);
        assert_eq!(
            elapsed_between(clock.now(), later),
            std::time::Duration::from_secs(3)
        );
    }
}
