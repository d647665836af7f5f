//! Dark theme while running on battery.

use std::sync::atomic::Ordering;

use super::EventRouter;
use crate::theme::{SwitchSource, Theme};

impl EventRouter {
    pub(super) fn on_power_changed(&self, on_battery: bool) {
        let state = self.coordinator.state();
        let changed = state.set_on_battery(on_battery);

        if !state.settings().dark_on_battery {
            return;
        }
        if !changed && self.power_tracking.load(Ordering::SeqCst) {
            return;
        }

        if on_battery {
            log_decorated!("Running on battery, switching to dark theme");
            self.coordinator
                .request_switch(SwitchSource::BatteryStatusChanged, Some(Theme::Dark));
        } else {
            log_decorated!("Back on AC power");
            self.coordinator
                .request_switch(SwitchSource::BatteryStatusChanged, None);
        }
    }

    /// Record whether the power monitor is running.
    ///
    /// Turning tracking off re-evaluates once so a battery-forced dark theme
    /// does not outlive the setting.
    pub fn set_power_tracking(&self, enabled: bool) {
        let was = self.power_tracking.swap(enabled, Ordering::SeqCst);
        if was && !enabled {
            log_decorated!("Dark theme on battery disabled");
            self.coordinator
                .request_switch(SwitchSource::BatteryStatusChanged, None);
        }
    }

    pub fn power_tracking(&self) -> bool {
        self.power_tracking.load(Ordering::SeqCst)
    }
}
