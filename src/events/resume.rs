//! Resume from suspend.

use super::EventRouter;
use crate::theme::SwitchSource;

impl EventRouter {
    pub(super) fn on_resumed(&self) {
        let state = self.coordinator.state();
        let postpones = state.postpones();

        postpones.sync_expiry_times_with_system_clock();

        // The desktop may have put its own theme back while we were asleep
        self.coordinator.reset_marker();

        if state.settings().auto_switch_notify {
            return;
        }
        if postpones.is_skip_next_switch() || postpones.is_user_delayed() {
            log_decorated!("Resumed, switch held back by user postpones");
            return;
        }
        log_decorated!("Resumed from suspend, refreshing theme");
        self.coordinator.request_switch(SwitchSource::SystemResume, None);
    }
}
