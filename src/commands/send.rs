//! Client verbs that map one-to-one onto a service command.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use super::{expect_ok, send_or_exit};
use crate::ipc::{ApiResponse, Command};
use crate::postpone::PostponeQueueDto;

/// Send `command` and report the answer.
///
/// Queries print plain values to stdout so they can be used from scripts.
pub fn handle_send_command(command: Command, debug_enabled: bool) -> Result<()> {
    if debug_enabled {
        log_pipe!();
        log_debug!("Sending '{}'", command.name());
    }

    let response = expect_ok(&command, send_or_exit(&command))?;

    match command {
        Command::GetRequestedTheme => println!("{}", message(&response)),
        Command::GetLearnedThemeNames => {
            let names: BTreeMap<String, String> = parse_details(&response)?;
            for (key, name) in names {
                println!("{key}: {name}");
            }
        }
        Command::GetPostponeStatus => {
            let queue: PostponeQueueDto = parse_details(&response)?;
            print_postpones(&queue);
        }
        _ => {
            log_version!();
            log_block_start!("{}", describe(&command, &response));
            log_end!();
        }
    }
    Ok(())
}

fn message(response: &ApiResponse) -> &str {
    response.message.as_deref().unwrap_or("")
}

fn parse_details<T: serde::de::DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    let details = response
        .details
        .as_deref()
        .context("Response carried no details")?;
    serde_json::from_str(details).context("Failed to parse response details")
}

pub(crate) fn print_postpones(queue: &PostponeQueueDto) {
    if queue.is_empty() {
        println!("No active postpones");
        return;
    }
    for item in &queue.items {
        let clearable = if item.is_user_clearable { "" } else { " (automatic)" };
        println!("{}{}", item.translated_reason, clearable);
    }
}

/// One human line describing what the service did.
fn describe(command: &Command, response: &ApiResponse) -> String {
    let message = message(response);
    match command {
        Command::RequestSwitch | Command::ForceLight | Command::ForceDark | Command::NoForce => {
            match message {
                "" => "Done".to_string(),
                "postponed" => "Automatic switching is postponed".to_string(),
                "auto switching disabled" => "Automatic switching is disabled".to_string(),
                theme => format!("Current theme: {theme}"),
            }
        }
        Command::Switch | Command::Light | Command::Dark => {
            format!("Switched to {message} until the next scheduled switch")
        }
        Command::ToggleSkipNext => match message {
            "true" => "The next automatic switch will be skipped".to_string(),
            _ => "Skip removed, automatic switching resumed".to_string(),
        },
        Command::ClearPostponeQueue => format!("Cleared {message} postpone(s)"),
        Command::DelayBy { minutes } => {
            format!("Automatic switching delayed by {minutes} minutes")
        }
        Command::Hotkey { .. } => message.to_string(),
        _ => match message {
            "" => "Done".to_string(),
            message => message.to_string(),
        },
    }
}
