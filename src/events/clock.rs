//! System clock changes.
//!
//! A change of the local UTC offset is a timezone change: sun times move
//! with it, so any skip is re-targeted before the switch. Anything else is a
//! clock jump (manual set, NTP step), which goes through the time-change
//! debounce and then resyncs postpone expiries.

use chrono::{DateTime, FixedOffset, Local};

use super::EventRouter;
use crate::common::utils::lock;
use crate::core::SwitchOutcome;
use crate::theme::SwitchSource;

/// Remembers the local UTC offset between clock events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWatch {
    offset: FixedOffset,
}

impl ClockWatch {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            offset: *now.offset(),
        }
    }

    /// Record the offset at `now`. Returns the previous offset if it changed.
    pub fn observe(&mut self, now: DateTime<Local>) -> Option<FixedOffset> {
        let offset = *now.offset();
        if offset == self.offset {
            return None;
        }
        Some(std::mem::replace(&mut self.offset, offset))
    }
}

impl EventRouter {
    pub(super) fn on_time_changed(&self) {
        let state = self.coordinator.state();
        let postpones = state.postpones();

        // Locking and unlocking can nudge the clock
        if postpones.is_session_locked() {
            if self.debug_enabled {
                log_debug!("Time change ignored while the session is locked");
            }
            return;
        }

        let now = state.now();
        if let Some(previous) = lock(&self.clock).observe(now) {
            log_pipe!();
            log_info!("Time zone changed from UTC{} to UTC{}", previous, now.offset());
            self.retarget_skip();
            self.coordinator
                .request_switch(SwitchSource::SystemTimeChanged, None);
            return;
        }

        let outcome = self
            .coordinator
            .request_switch(SwitchSource::SystemTimeChanged, None);
        if outcome == SwitchOutcome::Debounced {
            return;
        }

        log_decorated!("System time changed to {}", now.format("%Y-%m-%d %H:%M:%S"));
        postpones.sync_expiry_times_with_system_clock();
    }

    /// Recompute an active skip after the sun times moved.
    pub fn retarget_skip(&self) {
        let state = self.coordinator.state();
        if !state.postpones().is_skip_next_switch() {
            return;
        }
        match self.coordinator.skip_target(state.requested_theme()) {
            Ok(target) => {
                state.postpones().update_skip_next_expiry(target);
            }
            Err(e) => log_warning!("Could not recompute skip: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SystemEvent;
    use super::super::test_support::{at, harness, quiet};
    use super::*;
    use crate::postpone::PostponeItem;
    use crate::theme::Theme;
    use std::time::Duration;

    #[test]
    fn test_clock_watch_reports_offset_change() {
        let now = at(1, 12, 0);
        let mut watch = ClockWatch::new(now);
        assert_eq!(watch.observe(now), None);

        let shifted = FixedOffset::east_opt(now.offset().local_minus_utc() + 3600).unwrap();
        let mut moved = ClockWatch { offset: shifted };
        assert_eq!(moved.observe(now), Some(shifted));
        assert_eq!(moved.observe(now), None);
    }

    #[test]
    fn test_clock_jump_switches_and_prunes_postpones() {
        let h = harness(at(1, 12, 0), quiet());
        h.router
            .coordinator()
            .request_switch(SwitchSource::Startup, None);
        h.state()
            .postpones()
            .add(PostponeItem::delay(at(1, 12, 0), 30).unwrap());

        h.clock.advance(Duration::from_secs(2));
        h.clock.set(at(1, 20, 0));
        h.router.handle(SystemEvent::TimeChanged);

        assert!(!h.state().postpones().is_postponed());
        assert_eq!(h.applied(), vec![Theme::Light, Theme::Dark]);
    }

    #[test]
    fn test_duplicate_time_change_is_debounced() {
        let h = harness(at(1, 12, 0), quiet());
        h.router.handle(SystemEvent::TimeChanged);
        h.clock.set(at(1, 20, 0));
        h.router.handle(SystemEvent::TimeChanged);
        assert_eq!(h.applied(), vec![Theme::Light]);
    }

    #[test]
    fn test_time_change_ignored_while_locked() {
        let h = harness(at(1, 12, 0), quiet());
        h.router.handle(SystemEvent::SessionLocked);
        h.router.handle(SystemEvent::TimeChanged);
        assert!(h.applied().is_empty());
    }
}
