//! Default configuration file generation.
//!
//! The file is built from the constants in `common::constants`, with the
//! comments of every setting aligned to one column.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write the commented default configuration to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default config: {}", private_path(path));
    log_indented!("Edit it to set your location or commands");
    Ok(())
}

pub fn default_config_content() -> String {
    let mut content = ConfigBuilder::new()
        .section("Schedule")
        .setting(
            "governor",
            &format!("\"{}\"", DEFAULT_GOVERNOR.as_str()),
            "\"default\" (sunrise/sunset) or \"night_light\"",
        )
        .setting(
            "auto_switch",
            &DEFAULT_AUTO_SWITCH.to_string(),
            "Switch themes automatically",
        )
        .setting(
            "sunrise",
            &format!("\"{DEFAULT_SUNRISE}\""),
            "Manual sunrise (HH:MM:SS), unused with coordinates",
        )
        .setting(
            "sunset",
            &format!("\"{DEFAULT_SUNSET}\""),
            "Manual sunset (HH:MM:SS), unused with coordinates",
        )
        .setting(
            "sunrise_offset",
            &DEFAULT_SUN_OFFSET_MINUTES.to_string(),
            &format!(
                "Minutes added to sunrise ({MINIMUM_SUN_OFFSET_MINUTES}..{MAXIMUM_SUN_OFFSET_MINUTES})"
            ),
        )
        .setting(
            "sunset_offset",
            &DEFAULT_SUN_OFFSET_MINUTES.to_string(),
            &format!(
                "Minutes added to sunset ({MINIMUM_SUN_OFFSET_MINUTES}..{MAXIMUM_SUN_OFFSET_MINUTES})"
            ),
        )
        .section("Location")
        .disabled_setting("latitude", "52.5200", "Uncomment both to compute sun times")
        .disabled_setting("longitude", "13.4050", "Degrees east are positive")
        .section("Behaviour")
        .setting(
            "dark_on_battery",
            &DEFAULT_DARK_ON_BATTERY.to_string(),
            "Use the dark theme while on battery",
        )
        .setting(
            "auto_switch_notify",
            &DEFAULT_AUTO_SWITCH_NOTIFY.to_string(),
            "Ask before switching after unlocking",
        )
        .setting(
            "notify_grace_minutes",
            &DEFAULT_NOTIFY_GRACE_MINUTES.to_string(),
            &format!(
                "Time to answer that prompt ({MINIMUM_NOTIFY_GRACE_MINUTES}-{MAXIMUM_NOTIFY_GRACE_MINUTES}) minutes"
            ),
        )
        .section("Commands")
        .setting(
            "light_command",
            &format!("\"{DEFAULT_LIGHT_COMMAND}\""),
            "Applies the light theme",
        )
        .setting(
            "dark_command",
            &format!("\"{DEFAULT_DARK_COMMAND}\""),
            "Applies the dark theme",
        )
        .setting(
            "refresh_command",
            "\"\"",
            "Runs after every switch (empty = none)",
        )
        .setting(
            "refresh_timeout_ms",
            &DEFAULT_REFRESH_TIMEOUT_MS.to_string(),
            &format!(
                "Refresh command timeout ({MINIMUM_REFRESH_TIMEOUT_MS}-{MAXIMUM_REFRESH_TIMEOUT_MS}) ms"
            ),
        )
        .section("Advanced")
        .setting(
            "time_change_debounce_ms",
            &DEFAULT_TIME_CHANGE_DEBOUNCE_MS.to_string(),
            "Ignore repeated clock change events within this window",
        )
        .setting(
            "check_interval",
            &DEFAULT_CHECK_INTERVAL.to_string(),
            &format!(
                "Re-check the schedule at least this often ({MINIMUM_CHECK_INTERVAL}-{MAXIMUM_CHECK_INTERVAL}) seconds"
            ),
        )
        .setting(
            "ipc_timeout_ms",
            &DEFAULT_IPC_TIMEOUT_MS.to_string(),
            &format!(
                "Command deadline ({MINIMUM_IPC_TIMEOUT_MS}-{MAXIMUM_IPC_TIMEOUT_MS}) ms"
            ),
        )
        .build();
    content.push('\n');
    content
}

/// Builds a config file whose comments line up regardless of value lengths.
struct ConfigBuilder {
    entries: Vec<Entry>,
}

enum Entry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn section(mut self, title: &str) -> Self {
        self.entries.push(Entry::Section(format!("#[{title}]")));
        self
    }

    fn setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    /// A setting written commented out.
    fn disabled_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("#{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Setting { line, .. } => Some(line.len()),
                Entry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for entry in self.entries {
            match entry {
                Entry::Section(title) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(title);
                }
                Entry::Setting { line, comment } => {
                    let padding = " ".repeat(width - line.len());
                    lines.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        lines.join("\n")
    }
}
