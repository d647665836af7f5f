//! Process-wide engine state.
//!
//! Constructed once by the service and passed explicitly to the coordinator,
//! the event adapters and the command handler. Every field sits behind its own
//! guarded accessor; nothing outside this module touches the locks.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use crate::common::utils::lock;
use crate::geo::Schedule;
use crate::postpone::PostponeStore;
use crate::theme::{Governor, Theme};
use crate::time::SharedClock;

/// Configuration-derived knobs the engine consults on every decision.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub governor: Governor,
    pub schedule: Schedule,
    pub dark_on_battery: bool,
    pub auto_switch_notify: bool,
    pub notify_grace: chrono::Duration,
    pub time_change_debounce: Duration,
}

pub struct GlobalState {
    clock: SharedClock,
    postpones: PostponeStore,
    settings: RwLock<EngineSettings>,
    forced_theme: Mutex<Theme>,
    requested_theme: Mutex<Theme>,
    night_light_requested: Mutex<Theme>,
    on_battery: AtomicBool,
    auto_switch_enabled: AtomicBool,
    learned_theme_names: Mutex<BTreeMap<String, String>>,
}

impl GlobalState {
    pub fn new(clock: SharedClock, settings: EngineSettings, auto_switch_enabled: bool) -> Self {
        Self {
            postpones: PostponeStore::new(clock.clone()),
            clock,
            settings: RwLock::new(settings),
            forced_theme: Mutex::new(Theme::Unknown),
            requested_theme: Mutex::new(Theme::Unknown),
            night_light_requested: Mutex::new(Theme::Unknown),
            on_battery: AtomicBool::new(false),
            auto_switch_enabled: AtomicBool::new(auto_switch_enabled),
            learned_theme_names: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn postpones(&self) -> &PostponeStore {
        &self.postpones
    }

    // # Settings

    pub fn settings(&self) -> EngineSettings {
        self.settings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn replace_settings(&self, settings: EngineSettings) {
        *self
            .settings
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = settings;
    }

    pub fn governor(&self) -> Governor {
        self.settings().governor
    }

    // # Themes

    pub fn forced_theme(&self) -> Theme {
        *lock(&self.forced_theme)
    }

    /// Set or clear (with `Theme::Unknown`) the forced theme.
    pub fn set_forced_theme(&self, theme: Theme) {
        *lock(&self.forced_theme) = theme;
    }

    /// The theme the engine last decided on.
    pub fn requested_theme(&self) -> Theme {
        *lock(&self.requested_theme)
    }

    pub fn set_requested_theme(&self, theme: Theme) {
        *lock(&self.requested_theme) = theme;
    }

    /// The theme the night-light signal currently asks for.
    pub fn night_light_requested(&self) -> Theme {
        *lock(&self.night_light_requested)
    }

    pub fn set_night_light_requested(&self, theme: Theme) {
        *lock(&self.night_light_requested) = theme;
    }

    // # Flags

    pub fn on_battery(&self) -> bool {
        self.on_battery.load(Ordering::SeqCst)
    }

    pub fn set_on_battery(&self, on_battery: bool) -> bool {
        self.on_battery.swap(on_battery, Ordering::SeqCst) != on_battery
    }

    pub fn auto_switch_enabled(&self) -> bool {
        self.auto_switch_enabled.load(Ordering::SeqCst)
    }

    pub fn set_auto_switch_enabled(&self, enabled: bool) {
        self.auto_switch_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip automatic switching and return the new value.
    pub fn toggle_auto_switch(&self) -> bool {
        !self.auto_switch_enabled.fetch_xor(true, Ordering::SeqCst)
    }

    // # Learned theme names

    pub fn learned_theme_names(&self) -> BTreeMap<String, String> {
        lock(&self.learned_theme_names).clone()
    }

    pub fn learn_theme_name(&self, key: impl Into<String>, name: impl Into<String>) {
        lock(&self.learned_theme_names).insert(key.into(), name.into());
    }
}

impl std::fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalState")
            .field("forced_theme", &self.forced_theme())
            .field("requested_theme", &self.requested_theme())
            .field("on_battery", &self.on_battery())
            .field("auto_switch_enabled", &self.auto_switch_enabled())
            .field("postpones", &self.postpones)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{ManualSunTimes, SunOffsets};
    use crate::time::ManualTimeSource;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn state() -> GlobalState {
        let clock = Arc::new(ManualTimeSource::new(
            Local.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap(),
        ));
        let manual = ManualSunTimes::parse("07:00:00", "19:00:00").unwrap();
        let settings = EngineSettings {
            governor: Governor::Default,
            schedule: Schedule::new(Arc::new(manual), SunOffsets::default()),
            dark_on_battery: false,
            auto_switch_notify: false,
            notify_grace: chrono::Duration::minutes(2),
            time_change_debounce: Duration::from_millis(1000),
        };
        GlobalState::new(clock, settings, true)
    }

    #[test]
    fn test_forced_theme_round_trip() {
        let state = state();
        assert_eq!(state.forced_theme(), Theme::Unknown);
        state.set_forced_theme(Theme::Dark);
        assert_eq!(state.forced_theme(), Theme::Dark);
        state.set_forced_theme(Theme::Unknown);
        assert_eq!(state.forced_theme(), Theme::Unknown);
    }

    #[test]
    fn test_toggle_auto_switch() {
        let state = state();
        assert!(!state.toggle_auto_switch());
        assert!(!state.auto_switch_enabled());
        assert!(state.toggle_auto_switch());
    }

    #[test]
    fn test_set_on_battery_reports_change() {
        let state = state();
        assert!(state.set_on_battery(true));
        assert!(!state.set_on_battery(true));
        assert!(state.on_battery());
    }

    #[test]
    fn test_replace_settings() {
        let state = state();
        let mut settings = state.settings();
        settings.governor = Governor::NightLight;
        state.replace_settings(settings);
        assert_eq!(state.governor(), Governor::NightLight);
    }
}
