//! Request/reply command interface over a Unix socket.
//!
//! Each connection carries exactly one JSON [`Command`] line and gets back
//! exactly one JSON [`ApiResponse`] line:
//!
//! ```text
//! -> {"command":"delay_by","minutes":30}
//! <- {"status_code":"ok"}
//! ```
//!
//! - [`server`]: the socket listener and per-connection handling
//! - [`client`]: the blocking client used by the CLI verbs
//! - [`dispatch`]: maps commands onto the engine

pub mod client;
pub mod dispatch;
pub mod server;

pub use client::IpcClient;
pub use dispatch::CommandHandler;
pub use server::{IpcServer, RequestHandler, socket_path};

use serde::{Deserialize, Serialize};

use crate::events::HotkeyAction;

/// A command accepted by the running service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Re-evaluate the schedule now.
    RequestSwitch,
    /// Switch to the opposite theme and hold it.
    Switch,
    Light,
    Dark,
    ForceLight,
    ForceDark,
    NoForce,
    ToggleSkipNext,
    GetPostponeStatus,
    ClearPostponeQueue,
    DelayBy { minutes: i64 },
    GetRequestedTheme,
    GetLearnedThemeNames,
    Hotkey { action: HotkeyAction },
    Status,
    Alive,
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestSwitch => "request_switch",
            Command::Switch => "switch",
            Command::Light => "light",
            Command::Dark => "dark",
            Command::ForceLight => "force_light",
            Command::ForceDark => "force_dark",
            Command::NoForce => "no_force",
            Command::ToggleSkipNext => "toggle_skip_next",
            Command::GetPostponeStatus => "get_postpone_status",
            Command::ClearPostponeQueue => "clear_postpone_queue",
            Command::DelayBy { .. } => "delay_by",
            Command::GetRequestedTheme => "get_requested_theme",
            Command::GetLearnedThemeNames => "get_learned_theme_names",
            Command::Hotkey { .. } => "hotkey",
            Command::Status => "status",
            Command::Alive => "alive",
            Command::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Err,
    Timeout,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            status_code: StatusCode::Ok,
            message: None,
            details: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::Err,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status_code: StatusCode::Timeout,
            message: Some("Command did not finish in time".to_string()),
            details: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::Invalid,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::Ok
    }
}
