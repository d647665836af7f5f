//! Configuration loading.
//!
//! Resolves the config path, creates a default file when none exists, parses
//! it, validates it and fills in defaults.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Custom configuration directory, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for this process.
///
/// Can only be called once; later calls return an error.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The custom configuration directory, or `None` for the default one.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// `<custom dir>/duskswitch.toml` or `$XDG_CONFIG_HOME/duskswitch/duskswitch.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Load the configuration, writing the default file first if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path. Never creates the file.
pub fn load_from_path(path: &PathBuf) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    validate_config(&config)?;
    apply_defaults_and_modifications(&mut config);

    Ok(config)
}

fn apply_defaults(config: &mut Config) {
    config.governor.get_or_insert(DEFAULT_GOVERNOR);
    config.auto_switch.get_or_insert(DEFAULT_AUTO_SWITCH);
    config
        .sunrise
        .get_or_insert_with(|| DEFAULT_SUNRISE.to_string());
    config
        .sunset
        .get_or_insert_with(|| DEFAULT_SUNSET.to_string());
    config
        .sunrise_offset
        .get_or_insert(DEFAULT_SUN_OFFSET_MINUTES);
    config.sunset_offset.get_or_insert(DEFAULT_SUN_OFFSET_MINUTES);
    config.dark_on_battery.get_or_insert(DEFAULT_DARK_ON_BATTERY);
    config
        .auto_switch_notify
        .get_or_insert(DEFAULT_AUTO_SWITCH_NOTIFY);
    config
        .notify_grace_minutes
        .get_or_insert(DEFAULT_NOTIFY_GRACE_MINUTES);
    config
        .light_command
        .get_or_insert_with(|| DEFAULT_LIGHT_COMMAND.to_string());
    config
        .dark_command
        .get_or_insert_with(|| DEFAULT_DARK_COMMAND.to_string());
    config.refresh_command.get_or_insert_with(String::new);
    config
        .refresh_timeout_ms
        .get_or_insert(DEFAULT_REFRESH_TIMEOUT_MS);
    config
        .time_change_debounce_ms
        .get_or_insert(DEFAULT_TIME_CHANGE_DEBOUNCE_MS);
    config.check_interval.get_or_insert(DEFAULT_CHECK_INTERVAL);
    config.ipc_timeout_ms.get_or_insert(DEFAULT_IPC_TIMEOUT_MS);
}

/// Value adjustments that are not validation failures.
fn apply_modifications(config: &mut Config) {
    // Only one coordinate is useless; fall back to the manual times
    if config.latitude.is_some() != config.longitude.is_some() {
        log_pipe!();
        log_warning!("Only one of latitude/longitude is set, using manual sun times");
        config.latitude = None;
        config.longitude = None;
    }

    if let Some(lat) = config.latitude
        && lat.abs() > MAXIMUM_LATITUDE
    {
        log_pipe!();
        log_warning!(
            "Latitude capped at {}°{} (config {:.4}°{})",
            MAXIMUM_LATITUDE,
            if lat >= 0.0 { "N" } else { "S" },
            lat.abs(),
            if lat >= 0.0 { "N" } else { "S" }
        );
        log_indented!("Consider manual sunrise/sunset times for polar regions.");
        config.latitude = Some(MAXIMUM_LATITUDE * lat.signum());
    }
}

pub(crate) fn apply_defaults_and_modifications(config: &mut Config) {
    apply_defaults(config);
    apply_modifications(config);
}
