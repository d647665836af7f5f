//! Status command: show the running service's view of the themes.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use super::send::print_postpones;
use super::{expect_ok, send_or_exit};
use crate::ipc::Command;
use crate::ipc::dispatch::StatusReport;
use crate::theme::Theme;

pub fn handle_status_command(json: bool, debug_enabled: bool) -> Result<()> {
    let command = Command::Status;
    let response = expect_ok(&command, send_or_exit(&command))?;
    let details = response
        .details
        .context("Status response carried no details")?;

    if json {
        // Re-encode so the output is pretty and stable
        let report: StatusReport =
            serde_json::from_str(&details).context("Failed to parse status")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if debug_enabled {
        log_pipe!();
        log_debug!("Raw status: {}", details);
    }

    let report: StatusReport = serde_json::from_str(&details).context("Failed to parse status")?;
    display_human_readable(&report, Local::now());
    Ok(())
}

fn display_human_readable(report: &StatusReport, now: DateTime<Local>) {
    println!("  Current theme: {}", theme_label(report.applied));
    println!("      Requested: {}", theme_label(report.requested));
    if report.forced.is_known() {
        println!("         Forced: {}", report.forced);
    }
    println!("       Governor: {}", report.governor.as_str());
    println!(
        " Auto switching: {}",
        if report.auto_switch_enabled { "on" } else { "off" }
    );
    if let Some(scheduled) = report.scheduled {
        println!("      Scheduled: {}", scheduled);
    }
    if let Some(next) = report.next_switch {
        println!(
            "    Next switch: {} (in {})",
            next.format("%H:%M:%S"),
            format_duration(next - now)
        );
    }
    if report.on_battery {
        println!("          Power: battery");
    }
    if report.night_light_active {
        println!("    Night light: active");
    }
    println!();
    print_postpones(&report.postpones);
}

fn theme_label(theme: Theme) -> String {
    if theme.is_known() {
        theme.to_string()
    } else {
        "not yet applied".to_string()
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
