//! Implementation of the stop command.
//!
//! Asks the service to shut down over the command socket so it can save its
//! postpones, and falls back to SIGTERM when the socket does not answer.

use anyhow::Result;
use std::time::Duration;

use crate::io::instance;
use crate::ipc::{Command, IpcClient};

const STOP_WAIT: Duration = Duration::from_secs(3);
const STOP_POLL: Duration = Duration::from_millis(100);

pub fn handle_stop_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let Some(info) = instance::get_running_instance() else {
        log_error_exit!("duskswitch isn't running");
        return Ok(());
    };

    log_block_start!("Stopping duskswitch (PID: {})...", info.pid);

    match IpcClient::new().send(&Command::Shutdown) {
        Ok(response) if response.is_ok() => {
            if debug_enabled {
                log_pipe!();
                log_debug!("Shutdown requested over IPC");
            }
        }
        result => {
            if debug_enabled {
                log_pipe!();
                log_debug!("IPC shutdown unavailable ({:?}), sending SIGTERM", result.err());
            }
            if let Err(e) = instance::terminate_instance(info.pid) {
                log_error_exit!("Failed to terminate instance: {}", e);
                return Ok(());
            }
        }
    }

    let started = std::time::Instant::now();
    while started.elapsed() < STOP_WAIT {
        if !instance::is_instance_running(info.pid) {
            log_pipe!();
            log_info!("Process terminated successfully");
            log_end!();
            return Ok(());
        }
        std::thread::sleep(STOP_POLL);
    }

    log_pipe!();
    log_warning!("Process did not terminate within the expected time");
    log_indented!("The shutdown was requested, but the process may still be shutting down");
    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("stop - Stop the running service");
    log_block_start!("Usage: duskswitch stop");
    log_block_start!("Description:");
    log_indented!("Asks the service to shut down. Active delays and skips are saved");
    log_indented!("and restored on the next start if they are still valid.");
    log_end!();
}
