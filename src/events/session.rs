//! Session lock and unlock.

use chrono::Duration;

use super::EventRouter;
use crate::postpone::{PostponeItem, SESSION_LOCK, SWITCH_NOTIFICATION};
use crate::theme::SwitchSource;

impl EventRouter {
    pub(super) fn on_session_locked(&self) {
        if self.coordinator.state().postpones().add(PostponeItem::session_lock()) && self.debug_enabled {
            log_debug!("Session locked, automatic switching paused");
        }
    }

    pub(super) fn on_session_unlocked(&self) {
        let state = self.coordinator.state();
        let postpones = state.postpones();

        if !state.auto_switch_enabled() {
            log_decorated!("Session unlocked, automatic switching disabled");
            postpones.remove(SESSION_LOCK);
            return;
        }

        let settings = state.settings();
        if settings.auto_switch_notify {
            self.notify_at_unlock(settings.notify_grace);
            return;
        }

        postpones.remove(SESSION_LOCK);
        if postpones.is_skip_next_switch() || postpones.is_user_delayed() {
            log_decorated!("Session unlocked, switch held back by user postpones");
            return;
        }
        log_decorated!("Session unlocked, refreshing theme");
        self.coordinator.request_switch(SwitchSource::SystemUnlock, None);
    }

    /// Ask the user instead of switching. The grace item keeps automatic
    /// switching quiet until the user answers or it runs out.
    fn notify_at_unlock(&self, grace: Duration) {
        let state = self.coordinator.state();
        let postpones = state.postpones();

        let scheduled = match self.coordinator.scheduled_theme() {
            Ok(theme) => theme,
            Err(e) => {
                log_warning!("Could not compute scheduled theme: {e:#}");
                postpones.remove(SESSION_LOCK);
                return;
            }
        };

        if scheduled == state.requested_theme() {
            log_decorated!("Session unlocked, theme already matches the schedule");
            postpones.remove(SESSION_LOCK);
            return;
        }

        postpones.add(
            PostponeItem::new(SWITCH_NOTIFICATION)
                .with_expiry(state.now() + grace)
                .user_clearable(),
        );
        postpones.remove(SESSION_LOCK);
        self.notifier.prompt_switch(scheduled);
    }
}
