//! The capability that actually changes the desktop theme.

use anyhow::{Context, Result};
use std::sync::RwLock;
use std::time::Duration;

use super::Theme;
use crate::common::utils::run_shell_command;

/// Applies a theme to the desktop. Implementations may block briefly.
#[cfg_attr(test, mockall::automock)]
pub trait ThemeApplier: Send + Sync {
    fn apply(&self, theme: Theme) -> Result<()>;
}

/// Applies a theme by running one shell command per theme.
///
/// The defaults flip GNOME's `color-scheme` preference, which GTK4, libadwaita
/// and the xdg-desktop-portal settings interface all follow.
#[derive(Debug)]
pub struct CommandApplier {
    commands: RwLock<ThemeCommands>,
    timeout: Duration,
    debug_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThemeCommands {
    light: String,
    dark: String,
}

impl CommandApplier {
    pub fn new(light_command: String, dark_command: String, debug_enabled: bool) -> Self {
        Self {
            commands: RwLock::new(ThemeCommands {
                light: light_command,
                dark: dark_command,
            }),
            timeout: Duration::from_secs(10),
            debug_enabled,
        }
    }

    /// Swap in new commands after a config reload.
    pub fn set_commands(&self, light_command: String, dark_command: String) {
        let mut commands = self
            .commands
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *commands = ThemeCommands {
            light: light_command,
            dark: dark_command,
        };
    }

    fn command_for(&self, theme: Theme) -> Option<String> {
        let commands = self
            .commands
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match theme {
            Theme::Light => Some(commands.light.clone()),
            Theme::Dark => Some(commands.dark.clone()),
            Theme::Unknown => None,
        }
    }
}

impl ThemeApplier for CommandApplier {
    fn apply(&self, theme: Theme) -> Result<()> {
        let command = self
            .command_for(theme)
            .ok_or_else(|| anyhow::anyhow!("Refusing to apply the unknown theme"))?;

        if self.debug_enabled {
            log_debug!("Running {} theme command: {}", theme, command);
        }

        run_shell_command(&command, self.timeout)
            .with_context(|| format!("Failed to apply {theme} theme"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_applier_runs_matching_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("applied");
        let applier = CommandApplier::new(
            format!("echo light > {}", marker.display()),
            format!("echo dark > {}", marker.display()),
            false,
        );

        applier.apply(Theme::Dark).unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "dark");

        applier.apply(Theme::Light).unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "light");
    }

    #[test]
    fn test_command_applier_rejects_unknown() {
        let applier = CommandApplier::new("true".into(), "true".into(), false);
        assert!(applier.apply(Theme::Unknown).is_err());
    }

    #[test]
    fn test_command_applier_reload() {
        let applier = CommandApplier::new("exit 1".into(), "true".into(), false);
        assert!(applier.apply(Theme::Light).is_err());
        applier.set_commands("true".into(), "true".into());
        assert!(applier.apply(Theme::Light).is_ok());
    }

    #[test]
    fn test_command_applier_surfaces_failure() {
        let applier = CommandApplier::new("exit 1".into(), "true".into(), false);
        assert!(applier.apply(Theme::Light).is_err());
        assert!(applier.apply(Theme::Dark).is_ok());
    }
}
