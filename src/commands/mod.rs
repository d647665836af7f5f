//! One-shot command handlers.
//!
//! Every command except `run` is a short-lived client of the running service:
//! most go over the command socket, `stop` and `reload` fall back to signals.

pub mod help;
pub mod reload;
pub mod send;
pub mod status;
pub mod stop;

use anyhow::Result;

use crate::common::constants::EXIT_FAILURE;
use crate::ipc::{ApiResponse, Command, IpcClient};

/// Send `command` to the running service, exiting with an error message when
/// it is not running.
pub(crate) fn send_or_exit(command: &Command) -> ApiResponse {
    match IpcClient::new().send(command) {
        Ok(response) => response,
        Err(e) => {
            log_pipe!();
            log_error_exit!("duskswitch isn't running");
            log_indented!("{e:#}");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Turn a non-ok response into an error.
pub(crate) fn expect_ok(command: &Command, response: ApiResponse) -> Result<ApiResponse> {
    if response.is_ok() {
        return Ok(response);
    }
    anyhow::bail!(
        "'{}' failed ({:?}): {}",
        command.name(),
        response.status_code,
        response.message.as_deref().unwrap_or("no details")
    )
}
