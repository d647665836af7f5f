//! Time source abstraction for real and manually driven clocks.
//!
//! The engine reads wall-clock time for every schedule and expiry decision and
//! monotonic time for debouncing. Both come from an injected [`TimeSource`] so
//! tests can move the clock (including wall-clock jumps that leave monotonic
//! time untouched, which is what a suspend/resume looks like from user space).

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::common::utils::lock;

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Current monotonic instant.
    fn instant(&self) -> Instant;
}

pub type SharedClock = Arc<dyn TimeSource>;

/// Real-time implementation that uses the system clocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn shared() -> SharedClock {
        Arc::new(RealTimeSource)
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualTimeSource {
    inner: Mutex<ManualState>,
}

struct ManualState {
    wall: DateTime<Local>,
    monotonic_base: Instant,
    monotonic_offset: Duration,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            inner: Mutex::new(ManualState {
                wall: start,
                monotonic_base: Instant::now(),
                monotonic_offset: Duration::ZERO,
            }),
        }
    }

    /// Set the wall clock without touching monotonic time.
    pub fn set(&self, wall: DateTime<Local>) {
        lock(&self.inner).wall = wall;
    }

    /// Let time pass normally: both clocks move forward.
    pub fn advance(&self, by: Duration) {
        let mut state = lock(&self.inner);
        state.wall += ChronoDuration::from_std(by).unwrap_or(ChronoDuration::zero());
        state.monotonic_offset += by;
    }

    /// Move only the wall clock (suspend/resume, NTP step, manual `date`).
    pub fn jump_wall(&self, by: ChronoDuration) {
        lock(&self.inner).wall += by;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Local> {
        lock(&self.inner).wall
    }

    fn instant(&self) -> Instant {
        let state = lock(&self.inner);
        state.monotonic_base + state.monotonic_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_advance_moves_both_clocks() {
        let clock = ManualTimeSource::new(start());
        let before = clock.instant();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), start() + ChronoDuration::seconds(90));
        assert_eq!(clock.instant() - before, Duration::from_secs(90));
    }

    #[test]
    fn test_jump_wall_leaves_monotonic_untouched() {
        let clock = ManualTimeSource::new(start());
        let before = clock.instant();
        clock.jump_wall(ChronoDuration::hours(8));
        assert_eq!(clock.now(), start() + ChronoDuration::hours(8));
        assert_eq!(clock.instant(), before);
    }
}
