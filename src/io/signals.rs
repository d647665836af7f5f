//! Unix signal handling and the service message channel.
//!
//! Signals, OS monitors, the config watcher and the IPC server all talk to the
//! service loop through one mpsc channel of [`ServiceMessage`]s.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use crate::events::SystemEvent;

/// Everything the service loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceMessage {
    /// Re-read the configuration (SIGUSR2 or the file watcher).
    Reload,
    /// Stop the service (SIGINT, SIGTERM, SIGHUP, IPC `shutdown`).
    Shutdown,
    /// An OS event to route to the adapters.
    Event(SystemEvent),
    /// Re-plan the next wakeup; postpones or settings changed.
    Wake,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared once a shutdown was requested.
    pub running: Arc<AtomicBool>,
    pub receiver: Receiver<ServiceMessage>,
    /// Cloned into every producer.
    pub sender: Sender<ServiceMessage>,
}

impl SignalState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Register signal handlers and spawn the thread that forwards them.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (sender, receiver) = std::sync::mpsc::channel::<ServiceMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let sender_clone = sender.clone();

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let message = match sig {
                    SIGUSR2 => {
                        log_pipe!();
                        log_info!("Received configuration reload signal");
                        ServiceMessage::Reload
                    }
                    SIGINT => {
                        log_pipe!();
                        if debug_enabled {
                            log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                        } else {
                            log_info!("Received interrupt signal, initiating graceful shutdown...");
                        }
                        ServiceMessage::Shutdown
                    }
                    SIGTERM => {
                        log_pipe!();
                        log_info!("Received termination request, initiating graceful shutdown...");
                        ServiceMessage::Shutdown
                    }
                    _ => {
                        // SIGHUP: the terminal is gone, logging may fail
                        ServiceMessage::Shutdown
                    }
                };

                let shutdown = message == ServiceMessage::Shutdown;
                if shutdown {
                    running_clone.store(false, Ordering::SeqCst);
                }

                if sender_clone.send(message).is_err() {
                    // Main loop already gone
                    running_clone.store(false, Ordering::SeqCst);
                    break;
                }
            }
        })
        .context("failed to spawn signal thread")?;

    Ok(SignalState {
        running,
        receiver,
        sender,
    })
}
