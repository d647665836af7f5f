//! Configuration for the duskswitch service.
//!
//! Settings live in `duskswitch.toml` under `$XDG_CONFIG_HOME/duskswitch/`
//! (or the directory given with `--config`). A commented default file is
//! written on first start.
//!
//! ```toml
//! #[Schedule]
//! governor = "default"     # "default" (sunrise/sunset) or "night_light"
//! auto_switch = true       # Switch themes automatically
//! sunrise = "07:00:00"     # Manual sunrise (HH:MM:SS), ignored with coordinates
//! sunset = "19:00:00"      # Manual sunset (HH:MM:SS), ignored with coordinates
//! sunrise_offset = 0       # Minutes added to sunrise (-720..720)
//! sunset_offset = 0        # Minutes added to sunset (-720..720)
//!
//! #[Location]
//! latitude = 52.52         # Enables computed sun times when set with longitude
//! longitude = 13.405
//!
//! #[Behaviour]
//! dark_on_battery = false
//! auto_switch_notify = false
//! notify_grace_minutes = 2
//!
//! #[Commands]
//! light_command = "gsettings set org.gnome.desktop.interface color-scheme default"
//! dark_command = "gsettings set org.gnome.desktop.interface color-scheme prefer-dark"
//! refresh_command = ""
//! ```
//!
//! Loading runs `load → load_from_path → validate_config → apply_defaults`, so
//! after a successful load every field is `Some`.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::common::constants::*;
use crate::core::EngineSettings;
use crate::geo::{ManualSunTimes, Schedule, SolarSunTimes, SunOffsets, SunTimeSource};
use crate::theme::Governor;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Which signal drives automatic switching.
    pub governor: Option<Governor>,
    /// Automatic switching on start. The hotkey toggle does not write back.
    pub auto_switch: Option<bool>,

    pub sunrise: Option<String>, // HH:MM:SS
    pub sunset: Option<String>,  // HH:MM:SS
    pub sunrise_offset: Option<i64>, // minutes
    pub sunset_offset: Option<i64>,  // minutes
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Force the dark theme while running on battery.
    pub dark_on_battery: Option<bool>,
    /// After unlocking, ask before switching instead of switching right away.
    pub auto_switch_notify: Option<bool>,
    pub notify_grace_minutes: Option<u64>,

    pub light_command: Option<String>,
    pub dark_command: Option<String>,
    /// Run after every successful switch. Empty disables it.
    pub refresh_command: Option<String>,
    pub refresh_timeout_ms: Option<u64>,

    pub time_change_debounce_ms: Option<u64>,
    /// Upper bound between schedule evaluations, in seconds.
    pub check_interval: Option<u64>,
    pub ipc_timeout_ms: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn governor(&self) -> Governor {
        self.governor.unwrap_or(DEFAULT_GOVERNOR)
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch.unwrap_or(DEFAULT_AUTO_SWITCH)
    }

    pub fn dark_on_battery(&self) -> bool {
        self.dark_on_battery.unwrap_or(DEFAULT_DARK_ON_BATTERY)
    }

    pub fn light_command(&self) -> &str {
        self.light_command.as_deref().unwrap_or(DEFAULT_LIGHT_COMMAND)
    }

    pub fn dark_command(&self) -> &str {
        self.dark_command.as_deref().unwrap_or(DEFAULT_DARK_COMMAND)
    }

    /// `None` when no refresh command is configured.
    pub fn refresh_command(&self) -> Option<&str> {
        self.refresh_command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms.unwrap_or(DEFAULT_REFRESH_TIMEOUT_MS))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL))
    }

    pub fn ipc_timeout_ms(&self) -> u64 {
        self.ipc_timeout_ms.unwrap_or(DEFAULT_IPC_TIMEOUT_MS)
    }

    /// Coordinates, when both are configured.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Sun times from coordinates when present, else the manual times.
    pub fn schedule(&self) -> Result<Schedule> {
        let source: Arc<dyn SunTimeSource> = match self.coordinates() {
            Some((latitude, longitude)) => Arc::new(SolarSunTimes::new(latitude, longitude)?),
            None => Arc::new(ManualSunTimes::parse(
                self.sunrise.as_deref().unwrap_or(DEFAULT_SUNRISE),
                self.sunset.as_deref().unwrap_or(DEFAULT_SUNSET),
            )?),
        };
        let offsets = SunOffsets::new(
            self.sunrise_offset.unwrap_or(DEFAULT_SUN_OFFSET_MINUTES),
            self.sunset_offset.unwrap_or(DEFAULT_SUN_OFFSET_MINUTES),
        );
        Ok(Schedule::new(source, offsets))
    }

    /// The knobs the switch engine reads on every decision.
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            governor: self.governor(),
            schedule: self.schedule()?,
            dark_on_battery: self.dark_on_battery(),
            auto_switch_notify: self
                .auto_switch_notify
                .unwrap_or(DEFAULT_AUTO_SWITCH_NOTIFY),
            notify_grace: chrono::Duration::minutes(
                self.notify_grace_minutes
                    .unwrap_or(DEFAULT_NOTIFY_GRACE_MINUTES) as i64,
            ),
            time_change_debounce: Duration::from_millis(
                self.time_change_debounce_ms
                    .unwrap_or(DEFAULT_TIME_CHANGE_DEBOUNCE_MS),
            ),
        })
    }

    pub fn log_config(&self) {
        let source = match get_custom_config_dir() {
            Some(_) => "custom configuration",
            None => "default configuration",
        };
        log_block_start!("Loaded {}", source);

        match self.governor() {
            Governor::Default => log_indented!("Governor: sunrise/sunset"),
            Governor::NightLight => log_indented!("Governor: night light"),
        }

        match self.coordinates() {
            Some((lat, lon)) => {
                let lat_dir = if lat >= 0.0 { "N" } else { "S" };
                let lon_dir = if lon >= 0.0 { "E" } else { "W" };
                log_indented!(
                    "Location: {:.3}°{}, {:.3}°{}",
                    lat.abs(),
                    lat_dir,
                    lon.abs(),
                    lon_dir
                );
            }
            None => {
                log_indented!(
                    "Sunrise: {}",
                    self.sunrise.as_deref().unwrap_or(DEFAULT_SUNRISE)
                );
                log_indented!(
                    "Sunset: {}",
                    self.sunset.as_deref().unwrap_or(DEFAULT_SUNSET)
                );
            }
        }

        let sunrise_offset = self.sunrise_offset.unwrap_or(DEFAULT_SUN_OFFSET_MINUTES);
        let sunset_offset = self.sunset_offset.unwrap_or(DEFAULT_SUN_OFFSET_MINUTES);
        if sunrise_offset != 0 || sunset_offset != 0 {
            log_indented!(
                "Offsets: sunrise {:+} min, sunset {:+} min",
                sunrise_offset,
                sunset_offset
            );
        }

        if !self.auto_switch() {
            log_indented!("Automatic switching: disabled");
        }
        if self.dark_on_battery() {
            log_indented!("Dark theme on battery");
        }
        if self.auto_switch_notify.unwrap_or(DEFAULT_AUTO_SWITCH_NOTIFY) {
            log_indented!(
                "Ask before switching after unlock ({} min grace)",
                self.notify_grace_minutes
                    .unwrap_or(DEFAULT_NOTIFY_GRACE_MINUTES)
            );
        }
        if self.refresh_command().is_some() {
            log_indented!("Refresh command configured");
        }
        log_indented!("Check interval: {} seconds", self.check_interval().as_secs());
    }
}
