//! Client side of the command socket, used by the CLI verbs.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use super::server::socket_path;
use super::{ApiResponse, Command};
use crate::common::constants::CLIENT_READ_TIMEOUT_SECS;
use crate::common::utils::private_path;

/// One-shot client: every [`IpcClient::send`] opens its own connection.
pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    /// Client for the default socket.
    pub fn new() -> Self {
        Self {
            path: socket_path(),
        }
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Send `command` and wait for the response line.
    pub fn send(&self, command: &Command) -> Result<ApiResponse> {
        let mut stream = UnixStream::connect(&self.path).with_context(|| {
            format!(
                "Failed to connect to {}. Is duskswitch running?",
                private_path(&self.path)
            )
        })?;

        // Keep a wedged service from hanging the CLI
        stream
            .set_read_timeout(Some(Duration::from_secs(CLIENT_READ_TIMEOUT_SECS)))
            .context("Failed to set read timeout on IPC socket")?;

        let mut request = serde_json::to_string(command).context("Failed to serialize command")?;
        request.push('\n');
        stream
            .write_all(request.as_bytes())
            .context("Failed to send command")?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .context("Failed to read response from IPC socket")?;

        if line.trim().is_empty() {
            anyhow::bail!("Connection closed without a response");
        }

        serde_json::from_str(line.trim())
            .with_context(|| format!("Failed to parse response: {}", line.trim()))
    }

    /// Quick liveness probe.
    pub fn is_running(&self) -> bool {
        self.path.exists()
            && self
                .send(&Command::Alive)
                .map(|response| response.is_ok())
                .unwrap_or(false)
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}
