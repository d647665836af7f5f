//! Implementation of the reload command.
//!
//! Validates the configuration first so mistakes are reported here rather
//! than only in the service log, then sends SIGUSR2 to the running service.

use anyhow::Result;

use crate::config::Config;
use crate::io::instance;

pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    // Adopts the service's config directory when it was started with --config
    let running = instance::get_running_instance();

    if let Err(e) = Config::load() {
        log_pipe!();
        log_error_exit!("Configuration is invalid, not reloading: {e:#}");
        return Ok(());
    }

    let Some(info) = running else {
        log_error_exit!("duskswitch isn't running");
        return Ok(());
    };

    match instance::send_reload_signal(info.pid) {
        Ok(()) => {
            log_block_start!("Sent reload signal to duskswitch (PID: {})", info.pid);
            if debug_enabled {
                log_pipe!();
                log_debug!("SIGUSR2 sent to process {}", info.pid);
            }
            log_end!();
        }
        Err(e) => log_error_exit!("Failed to signal existing process: {e}"),
    }
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("reload - Reload the configuration");
    log_block_start!("Usage: duskswitch reload");
    log_block_start!("Description:");
    log_indented!("Validates duskswitch.toml and asks the running service to re-read it.");
    log_indented!("Edits are usually picked up automatically; use this when file");
    log_indented!("watching is unavailable.");
    log_end!();
}
