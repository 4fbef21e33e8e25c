//! Leading-edge rate limiter for pointer-hover and resize handling.
//!
//! Timestamps are supplied by the caller as `web_time::Instant`, which
//! uses `performance.now()` on WASM and `std::time::Instant` on native,
//! so the limiter itself never reads a clock.

use std::time::Duration;

use web_time::Instant;

/// Lets an event through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Create a throttle with the given minimum spacing.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Minimum spacing between accepted events.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records `now` if the interval has elapsed
    /// since the last accepted event (or nothing was accepted yet).
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last accepted event so the next one passes.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
