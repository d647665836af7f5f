//! D-Bus and kernel monitors for the OS events the engine reacts to.
//!
//! - Sleep/resume via the systemd-logind `PrepareForSleep` signal
//! - System time changes via timerfd with `TFD_TIMER_CANCEL_ON_SET`
//! - Session lock state via the logind session `LockedHint` property
//! - Power source via the UPower `OnBattery` property
//! - GNOME night light via `org.gnome.SettingsDaemon.Color`
//!
//! Every monitor runs on its own named thread, sends
//! [`ServiceMessage::Event`] to the service loop, and is owned through the
//! [`Subscription`] it returns. Polling monitors stop and are joined when the
//! subscription is dropped; the two blocking monitors (sleep signal stream,
//! timerfd) cannot be woken, so they are detached and stop forwarding once
//! their subscription is gone.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::common::constants::{CANCEL_POLL_MS, MONITOR_POLL_MS, RESUME_GRACE_SECS};
use crate::common::subscription::Subscription;
use crate::events::SystemEvent;
use crate::io::signals::ServiceMessage;

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true before sleeping and false after resuming.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait LogindSession {
    #[zbus(property)]
    fn locked_hint(&self) -> zbus::Result<bool>;
}

#[zbus::proxy(
    interface = "org.freedesktop.UPower",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower"
)]
trait UPower {
    #[zbus(property)]
    fn on_battery(&self) -> zbus::Result<bool>;
}

#[zbus::proxy(
    interface = "org.gnome.SettingsDaemon.Color",
    default_service = "org.gnome.SettingsDaemon.Color",
    default_path = "/org/gnome/SettingsDaemon/Color"
)]
trait GnomeColor {
    #[zbus(property)]
    fn night_light_active(&self) -> zbus::Result<bool>;
}

/// Shared between the sleep and time monitors so the clock jump a resume
/// causes is not reported as a time change.
#[derive(Clone, Default)]
pub struct SleepTracker {
    is_sleeping: Arc<AtomicBool>,
    /// Unix seconds of the last resume, 0 if none.
    resume_time: Arc<AtomicI64>,
}

impl SleepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn mark_sleeping(&self) {
        self.is_sleeping.store(true, Ordering::SeqCst);
    }

    fn mark_resumed(&self) {
        self.resume_time
            .store(Self::current_timestamp(), Ordering::SeqCst);
        self.is_sleeping.store(false, Ordering::SeqCst);
    }

    /// Whether a timer event right now should be blamed on sleep.
    pub fn explains_time_change(&self) -> bool {
        if self.is_sleeping.load(Ordering::SeqCst) {
            return true;
        }
        let resume_time = self.resume_time.load(Ordering::SeqCst);
        resume_time != 0 && Self::current_timestamp() - resume_time <= RESUME_GRACE_SECS
    }
}

/// Forwards events until its subscription is dropped.
#[derive(Clone)]
struct Forwarder {
    sender: Sender<ServiceMessage>,
    active: Arc<AtomicBool>,
}

impl Forwarder {
    fn new(sender: Sender<ServiceMessage>) -> Self {
        Self {
            sender,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns false once the monitor should exit.
    fn send(&self, event: SystemEvent) -> bool {
        self.is_active() && self.sender.send(ServiceMessage::Event(event)).is_ok()
    }

    fn subscription(&self) -> Subscription {
        let active = self.active.clone();
        Subscription::new(move || active.store(false, Ordering::SeqCst))
    }
}

fn spawn_named(name: &str, f: impl FnOnce() + Send + 'static) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .with_context(|| format!("Failed to spawn {name} thread"))
}

// # Sleep / resume

/// Watch logind `PrepareForSleep`.
pub fn start_sleep_monitor(
    sender: Sender<ServiceMessage>,
    tracker: SleepTracker,
    debug_enabled: bool,
) -> Result<Subscription> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let mut sleep_signals = proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    let forwarder = Forwarder::new(sender);
    let subscription = forwarder.subscription();

    spawn_named("sleep-monitor", move || {
        // Keep the connection and proxy alive for the stream
        let _connection = connection;
        let _proxy = proxy;
        for signal in &mut sleep_signals {
            let going_to_sleep = match signal.args() {
                Ok(args) => args.start,
                Err(e) => {
                    log_warning!("Failed to parse PrepareForSleep signal args: {}", e);
                    continue;
                }
            };

            let event = if going_to_sleep {
                tracker.mark_sleeping();
                SystemEvent::Sleeping
            } else {
                tracker.mark_resumed();
                log_pipe!();
                log_info!("System resuming from sleep/suspend");
                SystemEvent::Resumed
            };

            if !forwarder.send(event) {
                return;
            }
        }
        if forwarder.is_active() {
            log_pipe!();
            log_warning!("D-Bus connection lost, sleep/resume detection stopped");
        }
    })?;

    Ok(subscription)
}

// # Time changes

/// Far-future `CLOCK_REALTIME` timer that is cancelled whenever the clock is set.
struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = TimeChangeDetector { timer };
        detector.arm_timer()?;
        Ok(detector)
    }

    fn arm_timer(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;
        // i64::MAX seconds overflows the kernel's conversion
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)
    }

    /// Block until the clock is set.
    fn wait_for_time_change(&mut self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm_timer().context("Failed to re-arm time change timer")?;
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Timer wait error: {}", e)),
        }
    }
}

/// Watch for system clock changes, ignoring those caused by sleep.
pub fn start_time_change_monitor(
    sender: Sender<ServiceMessage>,
    tracker: SleepTracker,
    debug_enabled: bool,
) -> Result<Subscription> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_debug!("Starting timerfd-based time change monitoring");
    }

    let forwarder = Forwarder::new(sender);
    let subscription = forwarder.subscription();

    spawn_named("time-monitor", move || {
        loop {
            if let Err(e) = detector.wait_for_time_change() {
                log_pipe!();
                log_warning!("Time change monitor error: {e:#}");
                log_indented!("System time change detection will not be available");
                return;
            }
            if tracker.explains_time_change() {
                continue;
            }
            if !forwarder.send(SystemEvent::TimeChanged) {
                return;
            }
        }
    })?;

    Ok(subscription)
}

// # Polled properties

/// Poll `probe` every `interval` and emit when its value changes. The first
/// reading is always emitted.
fn start_poll_monitor(
    name: &'static str,
    sender: Sender<ServiceMessage>,
    interval: Duration,
    mut probe: impl FnMut() -> Result<bool> + Send + 'static,
    to_event: fn(bool) -> Option<SystemEvent>,
) -> Result<Subscription> {
    let forwarder = Forwarder::new(sender);
    let stop = forwarder.active.clone();

    let handle = spawn_named(name, move || {
        let mut last: Option<bool> = None;
        let mut failing = false;
        while forwarder.is_active() {
            match probe() {
                Ok(value) => {
                    failing = false;
                    if last != Some(value) {
                        let first = last.is_none();
                        last = Some(value);
                        if let Some(event) = to_event(value)
                            && !(first && is_quiet_initial(event))
                            && !forwarder.send(event)
                        {
                            return;
                        }
                    }
                }
                Err(e) => {
                    if !failing {
                        log_warning!("{} poll failed: {e:#}", name);
                        failing = true;
                    }
                }
            }

            let deadline = std::time::Instant::now() + interval;
            while forwarder.is_active() && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(CANCEL_POLL_MS));
            }
        }
    })?;

    Ok(Subscription::new(move || {
        stop.store(false, Ordering::SeqCst);
        let _ = handle.join();
    }))
}

/// An unlocked session at startup is not an unlock.
fn is_quiet_initial(event: SystemEvent) -> bool {
    event == SystemEvent::SessionUnlocked
}

/// Follow the session's `LockedHint`.
pub fn start_session_monitor(sender: Sender<ServiceMessage>) -> Result<Subscription> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let proxy = LogindSessionProxyBlocking::new(&connection)
        .context("Failed to create logind session proxy")?;
    proxy
        .locked_hint()
        .context("Session does not expose LockedHint")?;

    start_poll_monitor(
        "session-monitor",
        sender,
        Duration::from_millis(MONITOR_POLL_MS),
        move || Ok(proxy.locked_hint()?),
        |locked| {
            Some(if locked {
                SystemEvent::SessionLocked
            } else {
                SystemEvent::SessionUnlocked
            })
        },
    )
}

/// Follow UPower's `OnBattery`.
pub fn start_power_monitor(sender: Sender<ServiceMessage>) -> Result<Subscription> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let proxy = UPowerProxyBlocking::new(&connection).context("Failed to create UPower proxy")?;
    proxy.on_battery().context("UPower is not available")?;

    start_poll_monitor(
        "power-monitor",
        sender,
        Duration::from_millis(MONITOR_POLL_MS),
        move || Ok(proxy.on_battery()?),
        |on_battery| Some(SystemEvent::PowerChanged { on_battery }),
    )
}

/// Follow GNOME's `NightLightActive`.
pub fn start_night_light_monitor(sender: Sender<ServiceMessage>) -> Result<Subscription> {
    let connection = Connection::session().context("Failed to connect to session D-Bus")?;
    let proxy = GnomeColorProxyBlocking::new(&connection)
        .context("Failed to create GNOME color proxy")?;
    proxy
        .night_light_active()
        .context("GNOME night light is not available")?;

    start_poll_monitor(
        "night-light-monitor",
        sender,
        Duration::from_millis(MONITOR_POLL_MS),
        move || Ok(proxy.night_light_active()?),
        |active| Some(SystemEvent::NightLightChanged { active }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sleep_tracker_grace_period() {
        let tracker = SleepTracker::new();
        assert!(!tracker.explains_time_change());

        tracker.mark_sleeping();
        assert!(tracker.explains_time_change());

        tracker.mark_resumed();
        assert!(tracker.explains_time_change());

        tracker
            .resume_time
            .store(SleepTracker::current_timestamp() - 60, Ordering::SeqCst);
        assert!(!tracker.explains_time_change());
    }

    #[test]
    fn test_poll_monitor_emits_changes_and_joins_on_drop() {
        let (tx, rx) = std::sync::mpsc::channel();
        let readings = Arc::new(Mutex::new(vec![true, true, false]));
        let source = readings.clone();

        let subscription = start_poll_monitor(
            "test-monitor",
            tx,
            Duration::from_millis(10),
            move || {
                let mut values = source.lock().unwrap();
                Ok(if values.len() > 1 {
                    values.remove(0)
                } else {
                    values[0]
                })
            },
            |on_battery| Some(SystemEvent::PowerChanged { on_battery }),
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            first,
            ServiceMessage::Event(SystemEvent::PowerChanged { on_battery: true })
        );
        assert_eq!(
            second,
            ServiceMessage::Event(SystemEvent::PowerChanged { on_battery: false })
        );

        drop(subscription);
        // Joined: the sender is gone with the thread
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_unlocked_session_at_start_is_not_reported() {
        let (tx, rx) = std::sync::mpsc::channel();
        let subscription = start_poll_monitor(
            "test-session",
            tx,
            Duration::from_millis(10),
            || Ok(false),
            |locked| {
                Some(if locked {
                    SystemEvent::SessionLocked
                } else {
                    SystemEvent::SessionUnlocked
                })
            },
        )
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        subscription.unsubscribe();
    }
}
