//! Hotkey actions.
//!
//! Desktop keybinds run `duskswitch hotkey <action>`, which reaches the
//! running service over IPC and lands here.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::EventRouter;
use crate::theme::{SwitchSource, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    ForceDark,
    ForceLight,
    NoForce,
    ToggleTheme,
    ToggleAutoSwitch,
    TogglePostpone,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 6] = [
        HotkeyAction::ForceDark,
        HotkeyAction::ForceLight,
        HotkeyAction::NoForce,
        HotkeyAction::ToggleTheme,
        HotkeyAction::ToggleAutoSwitch,
        HotkeyAction::TogglePostpone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyAction::ForceDark => "force-dark",
            HotkeyAction::ForceLight => "force-light",
            HotkeyAction::NoForce => "no-force",
            HotkeyAction::ToggleTheme => "toggle-theme",
            HotkeyAction::ToggleAutoSwitch => "toggle-auto-switch",
            HotkeyAction::TogglePostpone => "toggle-postpone",
        }
    }
}

impl std::fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotkeyAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        HotkeyAction::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown hotkey action '{}'. Expected one of: {}",
                    s,
                    HotkeyAction::ALL.map(|a| a.as_str()).join(", ")
                )
            })
    }
}

impl EventRouter {
    /// Run a hotkey action and describe what happened.
    pub fn on_hotkey(&self, action: HotkeyAction) -> String {
        let state = self.coordinator.state();
        log_pipe!();
        log_info!("Hotkey: {}", action);

        match action {
            HotkeyAction::ForceDark | HotkeyAction::ForceLight => {
                let theme = if action == HotkeyAction::ForceDark {
                    Theme::Dark
                } else {
                    Theme::Light
                };
                state.set_forced_theme(theme);
                self.coordinator
                    .request_switch(SwitchSource::Hotkey, Some(theme));
                format!("Forcing {theme} theme")
            }
            HotkeyAction::NoForce => {
                state.set_forced_theme(Theme::Unknown);
                self.coordinator.request_switch(SwitchSource::Hotkey, None);
                "Stopped forcing a theme".to_string()
            }
            HotkeyAction::ToggleTheme => {
                let theme = self.coordinator.switch_auto_pause(None, SwitchSource::Hotkey);
                format!("Switched to {theme} theme")
            }
            HotkeyAction::ToggleAutoSwitch => {
                let enabled = state.toggle_auto_switch();
                log_indented!(
                    "Automatic switching {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                if enabled {
                    self.coordinator.request_switch(SwitchSource::Hotkey, None);
                }
                format!(
                    "Automatic switching {}",
                    if enabled { "enabled" } else { "disabled" }
                )
            }
            HotkeyAction::TogglePostpone => self.toggle_postpone(),
        }
    }

    fn toggle_postpone(&self) -> String {
        let state = self.coordinator.state();
        if !state.auto_switch_enabled() {
            return "Automatic switching is disabled, nothing to postpone".to_string();
        }

        let postpones = state.postpones();
        if postpones.is_skip_next_switch() {
            postpones.remove_skip_next();
            self.reset_skip_flip();
            self.coordinator.request_switch(SwitchSource::Hotkey, None);
            return "Skip cancelled".to_string();
        }

        match self.coordinator.skip_target(Theme::Unknown) {
            Ok(target) => {
                postpones.add_skip_next(target);
                self.reset_skip_flip();
                match target.expiry {
                    Some(expiry) => format!("Skipping the next switch until {}", expiry.format("%H:%M")),
                    None => "Skipping the next night light switch".to_string(),
                }
            }
            Err(e) => {
                log_warning!("Could not compute skip: {e:#}");
                format!("Could not skip: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SystemEvent;
    use super::super::test_support::{at, harness, quiet};
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!("force-dark".parse::<HotkeyAction>().unwrap(), HotkeyAction::ForceDark);
        assert_eq!(
            "toggle_auto_switch".parse::<HotkeyAction>().unwrap(),
            HotkeyAction::ToggleAutoSwitch
        );
        assert!("dance".parse::<HotkeyAction>().is_err());
    }

    #[test]
    fn test_action_json_is_snake_case() {
        let json = serde_json::to_string(&HotkeyAction::TogglePostpone).unwrap();
        assert_eq!(json, "\"toggle_postpone\"");
    }

    #[test]
    fn test_force_and_release() {
        let h = harness(at(1, 12, 0), quiet());
        h.router.handle(SystemEvent::Hotkey(HotkeyAction::ForceDark));
        assert_eq!(h.state().forced_theme(), Theme::Dark);

        h.router.handle(SystemEvent::Hotkey(HotkeyAction::NoForce));
        assert_eq!(h.state().forced_theme(), Theme::Unknown);
        assert_eq!(h.applied(), vec![Theme::Dark, Theme::Light]);
    }

    #[test]
    fn test_forced_theme_survives_schedule() {
        let h = harness(at(1, 12, 0), quiet());
        h.router.handle(SystemEvent::Hotkey(HotkeyAction::ForceDark));
        h.clock.set(at(1, 13, 0));
        h.router
            .coordinator()
            .request_switch(SwitchSource::TimeSwitch, None);
        assert_eq!(h.applied(), vec![Theme::Dark]);
    }

    #[test]
    fn test_toggle_theme_adds_skip() {
        let h = harness(at(1, 12, 0), quiet());
        h.router
            .coordinator()
            .request_switch(SwitchSource::Startup, None);
        h.router.on_hotkey(HotkeyAction::ToggleTheme);
        assert_eq!(h.applied(), vec![Theme::Light, Theme::Dark]);
        assert!(h.state().postpones().is_skip_next_switch());
    }

    #[test]
    fn test_toggle_auto_switch() {
        let h = harness(at(1, 12, 0), quiet());
        let message = h.router.on_hotkey(HotkeyAction::ToggleAutoSwitch);
        assert_eq!(message, "Automatic switching disabled");
        assert!(!h.state().auto_switch_enabled());
        h.router.on_hotkey(HotkeyAction::ToggleAutoSwitch);
        assert!(h.state().auto_switch_enabled());
        assert_eq!(h.applied(), vec![Theme::Light]);
    }

    #[test]
    fn test_toggle_postpone() {
        let h = harness(at(1, 12, 0), quiet());
        let message = h.router.on_hotkey(HotkeyAction::TogglePostpone);
        assert_eq!(message, "Skipping the next switch until 19:00");
        assert!(h.state().postpones().is_skip_next_switch());

        h.router.on_hotkey(HotkeyAction::TogglePostpone);
        assert!(!h.state().postpones().is_skip_next_switch());
        assert_eq!(h.applied(), vec![Theme::Light]);
    }
}
