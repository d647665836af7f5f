//! Structured logging with box-drawing output.
//!
//! The daemon writes its log as one continuous "pipe" of related blocks, which
//! keeps long-running output readable in a terminal or a journal:
//!
//! ```text
//! ┏ duskswitch v0.1.0 ━━╸
//! ┃
//! ┣ Loaded configuration
//! ┃   Governor: default
//! ┣[INFO] Applied dark theme (scheduled)
//! ╹
//! ```
//!
//! Output can be disabled at runtime (tests, one-shot client commands) and can
//! be redirected to a file through a dedicated writer thread.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Timestamps are only useful once output is detached from an interactive terminal
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Kind of line produced by the logging macros.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub enum Line {
    Decorated,
    Indented,
    Pipe,
    Block,
    Version,
    End,
    Info,
    Warning,
    Error,
    ErrorExit,
    Debug,
    Critical,
}

/// Logging interface and conventions.
///
/// - `log_block_start!` opens a new conceptual block (`┃` spacer + `┣ message`).
/// - `log_decorated!` continues a block (`┣ message`).
/// - `log_indented!` nests details under the previous line (`┃   message`).
/// - `log_pipe!` inserts an empty spacer, typically before a levelled message.
/// - `log_version!` / `log_end!` open and close the whole log.
/// - `log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!`
///   carry a coloured `[LEVEL]` tag.
pub struct Log;

impl Log {
    /// Enable or disable logging.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Route all output to `file_path` until the returned guard is dropped.
    ///
    /// Colour codes are stripped from file output and timestamps are enabled.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;
        Self::set_timestamps(true);

        let handle = std::thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&file_path)?;

                loop {
                    match rx.recv() {
                        Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                        Ok(LogMessage::Shutdown) | Err(_) => {
                            file.flush()?;
                            break;
                        }
                    }
                }

                Ok::<(), anyhow::Error>(())
            })?;

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::Relaxed) {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Flushes and stops the file writer thread when dropped.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Render one line and hand it to the active sink. Used by the macros.
#[doc(hidden)]
pub fn emit(line: Line, message: &str) {
    let prefix = Log::timestamp_prefix();
    let formatted = match line {
        Line::Decorated => format!("{prefix}┣ {message}\n"),
        Line::Indented => format!("{prefix}┃   {message}\n"),
        Line::Pipe => format!("{prefix}┃\n"),
        Line::Block => format!("{prefix}┃\n{prefix}┣ {message}\n"),
        Line::Version => format!(
            "{prefix}┏ duskswitch v{} ━━╸\n",
            env!("CARGO_PKG_VERSION")
        ),
        Line::End => format!("{prefix}╹\n"),
        Line::Info => format!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n"),
        Line::Warning => format!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
        Line::Error => format!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n"),
        Line::ErrorExit => format!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n"),
        Line::Debug => format!("{prefix}┣[\x1b[36mDEBUG\x1b[0m] {message}\n"),
        Line::Critical => format!("{prefix}┣[\x1b[31mCRITICAL\x1b[0m] {message}\n"),
    };
    write_output(&formatted);
}

pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($line:ident, $fmt:literal $($arg:tt)*) => {{
        if $crate::common::logger::Log::is_enabled() {
            let message = format!($fmt $($arg)*);
            $crate::common::logger::emit($crate::common::logger::Line::$line, &message);
        }
    }};
    ($line:ident, $expr:expr) => {{
        if $crate::common::logger::Log::is_enabled() {
            let message = $expr.to_string();
            $crate::common::logger::emit($crate::common::logger::Line::$line, &message);
        }
    }};
}

/// Log a line that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_line!(Decorated, $($arg)+) };
}

/// Log a nested detail line.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_line!(Indented, $($arg)+) };
}

/// Log an empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => { $crate::__log_line!(Pipe, "") };
}

/// Start a new block of related lines.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => { $crate::__log_line!(Block, $($arg)+) };
}

/// Log the version header.
#[macro_export]
macro_rules! log_version {
    () => { $crate::__log_line!(Version, "") };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => { $crate::__log_line!(End, "") };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_line!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_line!(Warning, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_line!(Error, $($arg)+) };
}

/// Log an error that ends the current flow (`┗[ERROR]`).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => { $crate::__log_line!(ErrorExit, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_line!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_line!(Critical, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(
            strip_ansi_codes("┣[\x1b[33mWARNING\x1b[0m] careful"),
            "┣[WARNING] careful"
        );
        assert_eq!(strip_ansi_codes("plain \x1b text"), "plain \x1b text");
    }

    #[test]
    fn test_macros_accept_literals_and_expressions() {
        Log::set_enabled(false);
        let reason = String::from("skip");
        log_info!("postpone {} active", reason);
        log_info!(reason);
        log_pipe!();
        log_end!();
        Log::set_enabled(true);
    }
}
