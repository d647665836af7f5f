//! Theme vocabulary: what can be shown, who decides, and why a switch happened.

pub mod applier;
pub mod night_light;
pub mod resolver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use applier::{CommandApplier, ThemeApplier};
pub use night_light::{NightLightSignal, NightLightState};
pub use resolver::resolve;

/// The two visual themes plus `Unknown`, which means "no override" and is
/// never a valid applied theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Unknown,
}

impl Theme {
    pub fn opposite(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
            Theme::Unknown => Theme::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Theme::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "unknown" | "none" | "auto" => Ok(Theme::Unknown),
            other => anyhow::bail!("Unknown theme '{other}' (expected light, dark or none)"),
        }
    }
}

/// Which signal drives automatic theme choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Governor {
    /// Sunrise/sunset, either computed from coordinates or configured manually.
    #[default]
    Default,
    /// The desktop's night-light state.
    NightLight,
}

impl Governor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Governor::Default => "default",
            Governor::NightLight => "night_light",
        }
    }
}

/// Why a switch was requested. Carried through for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchSource {
    Any,
    TimeSwitch,
    NightLightTracker,
    BatteryStatusChanged,
    SystemResume,
    Manual,
    ExternalThemeSwitch,
    Startup,
    SystemUnlock,
    Api,
    SystemTimeChanged,
    ConfigChange,
    Hotkey,
}

impl SwitchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchSource::Any => "any",
            SwitchSource::TimeSwitch => "time_switch",
            SwitchSource::NightLightTracker => "night_light_tracker",
            SwitchSource::BatteryStatusChanged => "battery_status_changed",
            SwitchSource::SystemResume => "system_resume",
            SwitchSource::Manual => "manual",
            SwitchSource::ExternalThemeSwitch => "external_theme_switch",
            SwitchSource::Startup => "startup",
            SwitchSource::SystemUnlock => "system_unlock",
            SwitchSource::Api => "api",
            SwitchSource::SystemTimeChanged => "system_time_changed",
            SwitchSource::ConfigChange => "config_change",
            SwitchSource::Hotkey => "hotkey",
        }
    }
}

impl fmt::Display for SwitchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_parsing() {
        assert_eq!("Light".parse::<Theme>().unwrap(), Theme::Light);
        assert_eq!(" dark ".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!("none".parse::<Theme>().unwrap(), Theme::Unknown);
        assert!("sepia".parse::<Theme>().is_err());
    }

    #[test]
    fn test_theme_opposite() {
        assert_eq!(Theme::Light.opposite(), Theme::Dark);
        assert_eq!(Theme::Dark.opposite(), Theme::Light);
        assert_eq!(Theme::Unknown.opposite(), Theme::Unknown);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        assert_eq!(
            serde_json::to_string(&SwitchSource::SystemTimeChanged).unwrap(),
            "\"system_time_changed\""
        );
        let governor: Governor = serde_json::from_str("\"night_light\"").unwrap();
        assert_eq!(governor, Governor::NightLight);
    }
}
