//! Per-command help.

use crate::args;

/// Show detailed help for `command`, or the general help if it is unknown.
pub fn run_help_command(command: &str) {
    match command {
        "stop" => super::stop::display_help(),
        "reload" => super::reload::display_help(),
        "status" => display_status_help(),
        "skip" => display_skip_help(),
        "delay" => display_delay_help(),
        "force" => display_force_help(),
        "hotkey" => display_hotkey_help(),
        "switch" | "light" | "dark" => display_switch_help(),
        other => {
            if !args::is_known_command(other) {
                log_warning!("Unknown command: {}", other);
            }
            args::display_help();
        }
    }
}

/// One-line usage, shown after argument errors.
pub fn show_command_usage(command: Option<&str>) {
    match command {
        Some("delay") => log_block_start!("Usage: duskswitch delay <minutes>"),
        Some("force") => log_block_start!("Usage: duskswitch force <light|dark|none>"),
        Some("hotkey") => log_block_start!("Usage: duskswitch hotkey <action>"),
        Some("status") => log_block_start!("Usage: duskswitch status [--json]"),
        _ => log_block_start!("Usage: duskswitch [OPTIONS] [COMMAND]"),
    }
}

fn display_status_help() {
    log_version!();
    log_block_start!("status - Show the service state");
    log_block_start!("Usage: duskswitch status [--json]");
    log_block_start!("Description:");
    log_indented!("Shows the applied, requested and forced themes, the next scheduled");
    log_indented!("switch and every active postpone.");
    log_block_start!("Options:");
    log_indented!("--json   Machine-readable output");
    log_end!();
}

fn display_skip_help() {
    log_version!();
    log_block_start!("skip - Skip the next automatic switch");
    log_block_start!("Usage: duskswitch skip");
    log_block_start!("Description:");
    log_indented!("Keeps the current theme past the next sunrise or sunset. Running it");
    log_indented!("again removes the skip and returns to the scheduled theme.");
    log_end!();
}

fn display_delay_help() {
    log_version!();
    log_block_start!("delay - Hold automatic switching");
    log_block_start!("Usage: duskswitch delay <minutes>");
    log_block_start!("Description:");
    log_indented!("No automatic switch happens until the delay expires. A new delay");
    log_indented!("replaces the previous one. 'duskswitch clear' ends it early.");
    log_end!();
}

fn display_force_help() {
    log_version!();
    log_block_start!("force - Pin a theme");
    log_block_start!("Usage: duskswitch force <light|dark|none>");
    log_block_start!("Description:");
    log_indented!("A forced theme wins over the schedule, battery and manual switches");
    log_indented!("until released with 'duskswitch force none'.");
    log_end!();
}

fn display_switch_help() {
    log_version!();
    log_block_start!("switch, light, dark - Manual switching");
    log_block_start!("Usage: duskswitch switch | light | dark");
    log_block_start!("Description:");
    log_indented!("Applies a theme now and skips the next automatic switch so the");
    log_indented!("choice holds until the schedule moves on.");
    log_end!();
}

fn display_hotkey_help() {
    log_version!();
    log_block_start!("hotkey - Run a hotkey action");
    log_block_start!("Usage: duskswitch hotkey <action>");
    log_block_start!("Actions:");
    for action in crate::events::HotkeyAction::ALL {
        log_indented!("{}", action);
    }
    log_block_start!("Bind these to keys in your desktop's shortcut settings.");
    log_end!();
}
