//! Small helpers shared across modules.

use anyhow::{Context, Result};
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, getuid};

/// Display a path with the home directory replaced by `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Lock a mutex, recovering the data if another thread panicked while holding it.
///
/// Every shared structure in the engine stays consistent between statements,
/// so a poisoned lock carries no torn state worth refusing.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-user runtime directory for the socket and lock file.
///
/// - Primary: `$XDG_RUNTIME_DIR`
/// - Fallback: `/run/user/{uid}`
pub fn runtime_dir() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(format!("/run/user/{}", getuid())),
    }
}

/// Directory for state that survives restarts (`$XDG_STATE_HOME/duskswitch`).
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .ok_or_else(|| anyhow::anyhow!("Could not determine state directory"))?;
    Ok(base.join(super::constants::APP_NAME))
}

/// How long a failed command's stderr is awaited after it exits.
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// Run `command` through `sh -c`, killing it if it outlives `timeout`.
///
/// The command runs in its own process group and the whole group is killed
/// on timeout. Stderr is drained on a helper thread so background children
/// holding the pipe open cannot stretch the wait past the deadline.
///
/// A non-zero exit status, a spawn failure and a timeout are all errors.
pub fn run_shell_command(command: &str, timeout: Duration) -> Result<()> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .with_context(|| format!("Failed to spawn '{command}'"))?;

    let stderr = child.stderr.take().map(|mut pipe| {
        let (sender, receiver) = mpsc::channel();
        let _ = thread::Builder::new()
            .name("shell-stderr".to_string())
            .spawn(move || {
                let mut output = String::new();
                let _ = pipe.read_to_string(&mut output);
                let _ = sender.send(output);
            });
        receiver
    });

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context("Failed to poll child process")? {
            if status.success() {
                return Ok(());
            }
            let wait = deadline
                .saturating_duration_since(Instant::now())
                .min(STDERR_GRACE);
            let output = stderr
                .and_then(|receiver| receiver.recv_timeout(wait).ok())
                .unwrap_or_default();
            anyhow::bail!("'{command}' exited with {status}: {}", output.trim());
        }

        if Instant::now() >= deadline {
            kill_process_group(&mut child);
            anyhow::bail!("'{command}' timed out after {}ms", timeout.as_millis());
        }

        thread::sleep(Duration::from_millis(10));
    }
}

fn kill_process_group(child: &mut Child) {
    match i32::try_from(child.id()) {
        Ok(pid) => {
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
        Err(_) => {
            let _ = child.kill();
        }
    }
    let _ = child.wait();
}
