//! Unix socket server for the command interface.
//!
//! The listener runs non-blocking on its own thread and polls a running flag.
//! Every accepted connection gets a short-lived thread that reads one request
//! line, runs the handler with a deadline and writes one response line.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{ApiResponse, Command};
use crate::common::constants::{CLIENT_READ_TIMEOUT_SECS, SOCKET_FILE_NAME};
use crate::common::utils::{private_path, runtime_dir};

/// Socket path: `$XDG_RUNTIME_DIR/duskswitch.sock`, falling back to
/// `/run/user/{uid}`.
pub fn socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_FILE_NAME)
}

/// Whatever answers commands. The service uses [`super::CommandHandler`].
pub trait RequestHandler: Send + Sync {
    fn handle(&self, command: Command) -> ApiResponse;
}

/// Handle to the listener thread.
pub struct IpcServer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Bind the default socket and start serving.
    ///
    /// `timeout_ms` is read for every request so a config reload takes effect
    /// without restarting the server.
    pub fn start(
        handler: Arc<dyn RequestHandler>,
        timeout_ms: Arc<AtomicU64>,
        debug_enabled: bool,
    ) -> Result<Self> {
        Self::start_at(socket_path(), handler, timeout_ms, debug_enabled)
    }

    pub fn start_at(
        path: PathBuf,
        handler: Arc<dyn RequestHandler>,
        timeout_ms: Arc<AtomicU64>,
        debug_enabled: bool,
    ) -> Result<Self> {
        let listener = bind(&path)?;
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || {
                serve(
                    listener,
                    &path,
                    handler,
                    timeout_ms,
                    running_clone,
                    debug_enabled,
                );
            })
            .context("Failed to spawn IPC server thread")?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop accepting connections and remove the socket.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind(path: &Path) -> Result<UnixListener> {
    // A previous instance that crashed leaves its socket behind
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", private_path(path)))?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create socket directory {}", private_path(parent))
        })?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind Unix socket {}", private_path(path)))?;
    listener
        .set_nonblocking(true)
        .context("Failed to set socket to non-blocking mode")?;
    Ok(listener)
}

fn serve(
    listener: UnixListener,
    path: &Path,
    handler: Arc<dyn RequestHandler>,
    timeout_ms: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    debug_enabled: bool,
) {
    if debug_enabled {
        log_debug!("IPC server listening on {}", private_path(path));
    }

    while running.load(Ordering::SeqCst) {
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let handler = handler.clone();
                    let timeout = Duration::from_millis(timeout_ms.load(Ordering::SeqCst));
                    let spawned = thread::Builder::new()
                        .name("ipc-client".to_string())
                        .spawn(move || {
                            if let Err(e) = serve_client(stream, handler, timeout, debug_enabled)
                                && debug_enabled
                            {
                                log_debug!("IPC client error: {e:#}");
                            }
                        });
                    if let Err(e) = spawned {
                        log_warning!("Failed to spawn IPC client thread: {e}");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log_warning!("IPC accept failed: {e}");
                    break;
                }
            }
        }

        thread::sleep(Duration::from_millis(10));
    }

    if debug_enabled {
        log_debug!("IPC server shutting down");
    }
    let _ = std::fs::remove_file(path);
}

fn serve_client(
    stream: UnixStream,
    handler: Arc<dyn RequestHandler>,
    timeout: Duration,
    debug_enabled: bool,
) -> Result<()> {
    // Accepted sockets inherit non-blocking mode from the listener
    stream
        .set_nonblocking(false)
        .context("Failed to set client stream to blocking mode")?;
    stream
        .set_read_timeout(Some(Duration::from_secs(CLIENT_READ_TIMEOUT_SECS)))
        .context("Failed to set read timeout on client stream")?;

    let mut reader = BufReader::new(
        stream
            .try_clone()
            .context("Failed to clone stream for reader")?,
    );
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read request")?;

    let response = match serde_json::from_str::<Command>(line.trim()) {
        Ok(command) => {
            if debug_enabled {
                log_debug!("IPC command: {}", command.name());
            }
            run_with_timeout(handler, command, timeout)
        }
        Err(e) => ApiResponse::invalid(format!("Invalid request: {e}")),
    };

    let mut json = serde_json::to_string(&response).context("Failed to serialize response")?;
    json.push('\n');
    let mut writer = stream;
    writer
        .write_all(json.as_bytes())
        .and_then(|_| writer.flush())
        .context("Failed to write response")
}

/// Run the handler on its own thread and give up waiting after `timeout`.
///
/// A handler that overruns keeps running to completion; only its answer is
/// dropped.
fn run_with_timeout(
    handler: Arc<dyn RequestHandler>,
    command: Command,
    timeout: Duration,
) -> ApiResponse {
    let (sender, receiver) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("ipc-handler".to_string())
        .spawn(move || {
            let _ = sender.send(handler.handle(command));
        });

    if let Err(e) = spawned {
        return ApiResponse::err(format!("Failed to run command: {e}"));
    }

    match receiver.recv_timeout(timeout) {
        Ok(response) => response,
        Err(mpsc::RecvTimeoutError::Timeout) => ApiResponse::timeout(),
        Err(mpsc::RecvTimeoutError::Disconnected) => ApiResponse::err("Command handler failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{IpcClient, StatusCode};

    struct EchoHandler;

    impl RequestHandler for EchoHandler {
        fn handle(&self, command: Command) -> ApiResponse {
            if command == Command::Shutdown {
                thread::sleep(Duration::from_millis(500));
            }
            ApiResponse::ok().with_message(command.name())
        }
    }

    fn start(dir: &Path, timeout_ms: u64) -> (IpcServer, PathBuf) {
        let path = dir.join("test.sock");
        let server = IpcServer::start_at(
            path.clone(),
            Arc::new(EchoHandler),
            Arc::new(AtomicU64::new(timeout_ms)),
            false,
        )
        .unwrap();
        (server, path)
    }

    #[test]
    fn test_socket_path() {
        let path = socket_path();
        assert!(path.to_string_lossy().ends_with("duskswitch.sock"));
    }

    #[test]
    fn test_request_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (server, path) = start(dir.path(), 1000);

        let response = IpcClient::at(path.clone()).send(&Command::Alive).unwrap();
        assert_eq!(response.status_code, StatusCode::Ok);
        assert_eq!(response.message.as_deref(), Some("alive"));

        server.shutdown();
        assert!(!path.exists());
    }

    #[test]
    fn test_slow_handler_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (server, path) = start(dir.path(), 100);

        let response = IpcClient::at(path).send(&Command::Shutdown).unwrap();
        assert_eq!(response.status_code, StatusCode::Timeout);
        server.shutdown();
    }

    #[test]
    fn test_malformed_request_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (server, path) = start(dir.path(), 1000);

        let mut stream = UnixStream::connect(&path).unwrap();
        stream.write_all(b"not json\n").unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        let response: ApiResponse = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(response.status_code, StatusCode::Invalid);
        server.shutdown();
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        std::fs::write(&path, "stale").unwrap();

        let (server, path) = start(dir.path(), 1000);
        assert!(IpcClient::at(path).send(&Command::Alive).unwrap().is_ok());
        server.shutdown();
    }
}
