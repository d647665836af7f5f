//! Hot reload: watch the config file and ask the service to reload it.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::constants::CONFIG_DEBOUNCE_MS;
use crate::common::utils::private_path;
use crate::io::signals::ServiceMessage;

/// Watches one config file and sends [`ServiceMessage::Reload`] on changes.
pub struct ConfigWatcher {
    sender: Sender<ServiceMessage>,
    config_path: PathBuf,
    debug_enabled: bool,
}

impl ConfigWatcher {
    pub fn new(sender: Sender<ServiceMessage>, config_path: PathBuf, debug_enabled: bool) -> Self {
        Self {
            sender,
            config_path,
            debug_enabled,
        }
    }

    /// Spawn the watcher thread. It lives until the service channel closes.
    pub fn start(self) -> Result<()> {
        // Editors replace files on save, so watch the directory rather than the file
        let watch_dir = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .context("Config path has no parent directory")?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory {}", private_path(&watch_dir)))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", private_path(&self.config_path));
        }

        thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                // The watcher stops when dropped
                let _watcher = watcher;
                let mut last_reload: Option<Instant> = None;

                for event in rx {
                    if !event
                        .paths
                        .iter()
                        .any(|path| affects_config(path, &self.config_path))
                    {
                        continue;
                    }

                    if last_reload
                        .is_some_and(|at| at.elapsed() < Duration::from_millis(CONFIG_DEBOUNCE_MS))
                    {
                        continue;
                    }

                    if self.debug_enabled {
                        log_pipe!();
                        log_debug!("Configuration file change detected");
                    }

                    if self.sender.send(ServiceMessage::Reload).is_err() {
                        break;
                    }
                    last_reload = Some(Instant::now());
                }
            })
            .context("Failed to spawn config watcher thread")?;

        Ok(())
    }
}

/// Whether a change to `path` concerns the config file, including the
/// temporary files editors write next to it.
fn affects_config(path: &Path, config_path: &Path) -> bool {
    if path == config_path {
        return true;
    }
    if path.parent() != config_path.parent() {
        return false;
    }
    match (
        path.file_name().and_then(|n| n.to_str()),
        config_path.file_name().and_then(|n| n.to_str()),
    ) {
        (Some(name), Some(config_name)) => name.starts_with(config_name),
        _ => false,
    }
}

pub fn start_config_watcher(
    sender: Sender<ServiceMessage>,
    config_path: PathBuf,
    debug_enabled: bool,
) -> Result<()> {
    ConfigWatcher::new(sender, config_path, debug_enabled).start()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affects_config() {
        let config = Path::new("/home/u/.config/duskswitch/duskswitch.toml");
        assert!(affects_config(config, config));
        assert!(affects_config(
            Path::new("/home/u/.config/duskswitch/duskswitch.toml.swp"),
            config
        ));
        assert!(!affects_config(
            Path::new("/home/u/.config/duskswitch/other.toml"),
            config
        ));
        assert!(!affects_config(
            Path::new("/tmp/duskswitch.toml"),
            config
        ));
    }

    #[test]
    fn test_watcher_sends_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duskswitch.toml");
        std::fs::write(&path, "auto_switch = true\n").unwrap();

        let (sender, receiver) = std::sync::mpsc::channel();
        start_config_watcher(sender, path.clone(), false).unwrap();

        thread::sleep(Duration::from_millis(100));
        std::fs::write(&path, "auto_switch = false\n").unwrap();

        let message = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message, ServiceMessage::Reload);
    }
}
