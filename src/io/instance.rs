//! Instance management for the duskswitch service.
//!
//! Builds on [`crate::io::lock`]: the service holds the lock for its whole
//! lifetime and records its PID and config directory in it, so client
//! commands can find it and talk to the same configuration.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::io::lock::{self, LockFile};

/// Information about a running service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub pid: u32,
    /// Custom config directory if one was given with `--config`.
    pub config_dir: Option<PathBuf>,
}

impl InstanceInfo {
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            config_dir: crate::config::get_custom_config_dir(),
        }
    }

    /// Parse lock file contents: PID on the first line, optional config
    /// directory on the second.
    pub fn from_lock_contents(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();

        let pid = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .context("Lock file is empty")?
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;

        let config_dir = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);

        if lines.any(|line| !line.trim().is_empty()) {
            anyhow::bail!("Invalid lock file format (expected 1-2 lines)");
        }

        Ok(Self { pid, config_dir })
    }

    pub fn to_lock_contents(&self) -> String {
        match &self.config_dir {
            Some(dir) => format!("{}\n{}\n", self.pid, dir.display()),
            None => format!("{}\n\n", self.pid),
        }
    }
}

/// Take the service lock, clearing a stale one left by a dead process.
///
/// Returns `Ok(None)` when a live instance already holds it.
pub fn ensure_single_instance() -> Result<Option<LockFile>> {
    let lock_path = lock::main_lock_path();

    for _ in 0..2 {
        if let Some(mut lock) = LockFile::try_acquire(&lock_path)? {
            lock.write(&InstanceInfo::current().to_lock_contents())?;
            return Ok(Some(lock));
        }

        match read_instance_info() {
            Some(info) if is_instance_running(info.pid) => return Ok(None),
            Some(info) => {
                log_warning!(
                    "Removing stale lock file (process {} no longer running)",
                    info.pid
                );
                let _ = std::fs::remove_file(&lock_path);
            }
            None => {
                log_warning!("Lock file format invalid, removing");
                let _ = std::fs::remove_file(&lock_path);
            }
        }
    }

    anyhow::bail!("Failed to acquire lock after clearing a stale one")
}

fn read_instance_info() -> Option<InstanceInfo> {
    let content = std::fs::read_to_string(lock::main_lock_path()).ok()?;
    InstanceInfo::from_lock_contents(&content).ok()
}

/// The running service, if any.
///
/// Also adopts the instance's config directory so client commands read the
/// same configuration the service uses.
pub fn get_running_instance() -> Option<InstanceInfo> {
    let info = read_instance_info()?;

    if let Some(ref config_dir) = info.config_dir {
        let _ = crate::config::set_config_dir(Some(config_dir.display().to_string()));
    }

    is_instance_running(info.pid).then_some(info)
}

pub fn is_instance_running(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

/// Ask a running instance to stop (SIGTERM).
pub fn terminate_instance(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| anyhow::anyhow!("Failed to send SIGTERM to process: {}", e))
}

/// Ask a running instance to reload its configuration (SIGUSR2).
pub fn send_reload_signal(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGUSR2)
        .map_err(|e| anyhow::anyhow!("Failed to send reload signal: {}", e))
}
