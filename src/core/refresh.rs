//! Best-effort desktop refresh after a theme apply.
//!
//! One dedicated worker drains a FIFO queue of [`RefreshJob`]s. Enqueueing never
//! blocks, so the switch path returns while a slow broadcast is still running.
//! Each broadcast runs under a hard timeout: a hung receiver delays only its own
//! job, and the worker moves on to the next one.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::common::constants::{CANCEL_POLL_MS, REFRESH_SETTLE_DELAY_MS};
use crate::common::utils::{lock, run_shell_command};
use crate::theme::SwitchSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshJob {
    pub source: SwitchSource,
    /// Wait this long before broadcasting.
    pub delay: Duration,
}

impl RefreshJob {
    pub fn new(source: SwitchSource) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(source: SwitchSource, delay: Duration) -> Self {
        Self { source, delay }
    }

    /// The job enqueued after an apply for `source`. Resume and unlock
    /// refreshes wait `REFRESH_SETTLE_DELAY_MS` first.
    pub fn after_apply(source: SwitchSource) -> Self {
        match source {
            SwitchSource::SystemResume | SwitchSource::SystemUnlock => {
                Self::delayed(source, Duration::from_millis(REFRESH_SETTLE_DELAY_MS))
            }
            _ => Self::new(source),
        }
    }
}

/// Performs the desktop-wide refresh. May block.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, job: &RefreshJob) -> Result<()>;
}

/// Runs the configured `refresh_command`; without one the broadcast is a no-op.
#[derive(Debug)]
pub struct HookBroadcaster {
    hook: Mutex<(Option<String>, Duration)>,
}

impl HookBroadcaster {
    pub fn new(command: Option<String>, timeout: Duration) -> Self {
        Self {
            hook: Mutex::new((command, timeout)),
        }
    }

    /// Replace the command after a config reload. Affects jobs not yet started.
    pub fn set_command(&self, command: Option<String>, timeout: Duration) {
        *lock(&self.hook) = (command, timeout);
    }
}

impl Broadcaster for HookBroadcaster {
    fn broadcast(&self, _job: &RefreshJob) -> Result<()> {
        let (command, timeout) = lock(&self.hook).clone();
        match command.as_deref() {
            Some(command) if !command.trim().is_empty() => run_shell_command(command, timeout),
            _ => Ok(()),
        }
    }
}

/// Cloneable, non-blocking producer side of the refresh queue.
#[derive(Clone)]
pub struct RefreshQueue {
    sender: Arc<Mutex<Option<mpsc::Sender<RefreshJob>>>>,
    pending: Arc<AtomicUsize>,
}

impl RefreshQueue {
    /// Queue a job. Returns `false` once the queue has been closed.
    pub fn enqueue(&self, job: RefreshJob) -> bool {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Jobs queued but not yet started.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn close(&self) {
        lock(&self.sender).take();
    }
}

/// Owner of the worker thread.
pub struct RefreshWorker {
    queue: RefreshQueue,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    pub fn start(
        broadcaster: Arc<dyn Broadcaster>,
        job_timeout: Duration,
        debug_enabled: bool,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<RefreshJob>();
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let queue = RefreshQueue {
            sender: Arc::new(Mutex::new(Some(tx))),
            pending: pending.clone(),
        };

        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("refresh-worker".to_string())
            .spawn(move || {
                worker_loop(
                    rx,
                    broadcaster,
                    job_timeout,
                    pending,
                    worker_cancel,
                    debug_enabled,
                )
            })?;

        Ok(Self {
            queue,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> RefreshQueue {
        self.queue.clone()
    }

    /// Close the queue, cancel the worker and join it for at most `wait`.
    ///
    /// Jobs that never started are discarded; their number is returned.
    pub fn shutdown(mut self, wait: Duration) -> usize {
        self.stop(wait)
    }

    fn stop(&mut self, wait: Duration) -> usize {
        self.queue.close();
        self.cancel.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + wait;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log_warning!(
                    "Refresh worker did not stop within {}ms, detaching",
                    wait.as_millis()
                );
            }
        }

        self.queue.pending.swap(0, Ordering::SeqCst)
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(Duration::ZERO);
        }
    }
}

fn worker_loop(
    rx: mpsc::Receiver<RefreshJob>,
    broadcaster: Arc<dyn Broadcaster>,
    job_timeout: Duration,
    pending: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
    debug_enabled: bool,
) {
    let poll = Duration::from_millis(CANCEL_POLL_MS);
    loop {
        match rx.recv_timeout(poll) {
            Ok(job) => {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                pending.fetch_sub(1, Ordering::SeqCst);
                run_job(&broadcaster, job, job_timeout, &cancel, debug_enabled);
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if debug_enabled {
        log_debug!("Refresh worker stopped");
    }
}

/// Sleep in slices so cancellation is noticed. Returns `false` if cancelled.
fn sleep_cancellable(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(CANCEL_POLL_MS)));
    }
}

fn run_job(
    broadcaster: &Arc<dyn Broadcaster>,
    job: RefreshJob,
    timeout: Duration,
    cancel: &AtomicBool,
    debug_enabled: bool,
) {
    if !job.delay.is_zero() && !sleep_cancellable(job.delay, cancel) {
        return;
    }

    let (done_tx, done_rx) = mpsc::channel();
    let runner = broadcaster.clone();
    let spawned = thread::Builder::new()
        .name("refresh-broadcast".to_string())
        .spawn(move || {
            let _ = done_tx.send(runner.broadcast(&job));
        });

    if let Err(e) = spawned {
        log_warning!("Could not start refresh broadcast: {}", e);
        return;
    }

    let deadline = Instant::now() + timeout;
    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done_rx.recv_timeout(remaining.min(Duration::from_millis(CANCEL_POLL_MS))) {
            Err(RecvTimeoutError::Timeout)
                if !remaining.is_zero() && !cancel.load(Ordering::SeqCst) =>
            {
                continue;
            }
            other => break other,
        }
    };

    match outcome {
        Ok(Ok(())) => {
            if debug_enabled {
                log_debug!("Refresh broadcast done ({})", job.source);
            }
        }
        Ok(Err(e)) => log_warning!("Refresh broadcast failed: {e:#}"),
        Err(RecvTimeoutError::Timeout) if cancel.load(Ordering::SeqCst) => {
            log_warning!("Refresh broadcast abandoned on shutdown")
        }
        Err(RecvTimeoutError::Timeout) => {
            log_warning!("Refresh broadcast timed out after {}ms", timeout.as_millis())
        }
        Err(RecvTimeoutError::Disconnected) => log_error!("Refresh broadcast panicked"),
    }
}
