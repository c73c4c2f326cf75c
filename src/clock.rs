// Time Source
// Wall-clock reads go through this trait so the stepper and countdown can be
// driven deterministically in tests.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    /// Advance by a fractional number of seconds, at nanosecond resolution.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::nanoseconds((secs * 1e9).round() as i64));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock() = to;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

// =============================================================================
// FRAME TIMER
// =============================================================================

/// Turns successive clock readings into clamped per-frame deltas.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last: DateTime<Utc>,
    max_delta_secs: f64,
}

impl FrameTimer {
    pub fn new(now: DateTime<Utc>, max_delta_secs: f64) -> Self {
        Self {
            last: now,
            max_delta_secs,
        }
    }

    /// Seconds since the previous call, clamped to `[0, max_delta_secs]`.
    /// A clock that steps backwards yields zero.
    pub fn delta(&mut self, now: DateTime<Utc>) -> f64 {
        let raw = (now - self.last)
            .num_nanoseconds()
            .map(|ns| ns as f64 / 1e9)
            .unwrap_or(self.max_delta_secs);
        self.last = now;
        raw.clamp(0.0, self.max_delta_secs)
    }

    /// Forget the time since the last frame so the next delta starts from `now`.
    pub fn rebase(&mut self, now: DateTime<Utc>) {
        self.last = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(epoch());
        clock.advance_secs(1.5);
        assert_eq!(clock.now() - epoch(), Duration::milliseconds(1500));
    }

    #[test]
    fn test_frame_timer_clamps_large_gaps() {
        let clock = ManualClock::new(epoch());
        let mut timer = FrameTimer::new(clock.now(), 0.1);

        clock.advance_secs(0.016);
        assert_relative_eq!(timer.delta(clock.now()), 0.016, epsilon = 1e-9);

        // Tab suspended for a minute
        clock.advance(Duration::seconds(60));
        assert_relative_eq!(timer.delta(clock.now()), 0.1);
    }

    #[test]
    fn test_frame_timer_rebase_drops_pending_time() {
        let clock = ManualClock::new(epoch());
        let mut timer = FrameTimer::new(clock.now(), 0.1);

        clock.advance_secs(0.05);
        timer.rebase(clock.now());
        assert_eq!(timer.delta(clock.now()), 0.0);
    }

    #[test]
    fn test_frame_timer_ignores_backwards_clock() {
        let clock = ManualClock::new(epoch());
        let mut timer = FrameTimer::new(clock.now(), 0.1);
        clock.set(epoch() - Duration::seconds(5));
        assert_eq!(timer.delta(clock.now()), 0.0);
    }
}
