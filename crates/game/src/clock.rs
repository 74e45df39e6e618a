//! Injectable monotonic clock and fixed-interval ticker (C4).

use std::time::{Duration, Instant};

/// Monotonic time source. Production code uses [`RealClock`]; tests use
/// [`FakeClock`] so ticks can be driven deterministically without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock with an explicit, externally-advanced time.
pub struct FakeClock {
    current: std::sync::Mutex<Instant>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut guard = self.current.lock().expect("fake clock mutex poisoned");
        *guard += duration;
    }

    pub fn set_time(&self, instant: Instant) {
        *self.current.lock().expect("fake clock mutex poisoned") = instant;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock().expect("fake clock mutex poisoned")
    }
}

/// Fires at most once per call, when at least `interval` has elapsed since
/// the last fire. Catching up across multiple missed intervals is left to
/// the caller (the session engine computes `desired ticks` itself).
pub struct Ticker {
    interval: Duration,
    last_tick: Instant,
}

impl Ticker {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last_tick: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_tick(&self) -> Instant {
        self.last_tick
    }

    pub fn set_last_tick(&mut self, at: Instant) {
        self.last_tick = at;
    }

    /// Returns true and advances `last_tick` iff `now - last_tick >= interval`.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_tick) >= self.interval {
            self.last_tick = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_fires_once_interval_elapses() {
        let clock = FakeClock::new();
        let mut ticker = Ticker::new(Duration::from_millis(33), clock.now());

        assert!(!ticker.tick(clock.now()));
        clock.advance(Duration::from_millis(20));
        assert!(!ticker.tick(clock.now()));
        clock.advance(Duration::from_millis(13));
        assert!(ticker.tick(clock.now()));
        assert!(!ticker.tick(clock.now()));
    }

    #[test]
    fn fake_clock_set_time_is_observed() {
        let clock = FakeClock::new();
        let target = clock.now() + Duration::from_secs(5);
        clock.set_time(target);
        assert_eq!(clock.now(), target);
    }
}
