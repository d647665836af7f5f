//! The long-running duskswitch service.
//!
//! Acquires the instance lock, wires the engine together, starts the OS
//! monitors, the command socket and the config watcher, then runs the main
//! loop until a shutdown is requested:
//!
//! - messages from signals, monitors, the watcher and the IPC handler arrive on
//!   one channel and are handled on the main thread
//! - between messages the loop sleeps until the next schedule boundary, the
//!   next postpone expiry or `check_interval`, whichever comes first, and then
//!   re-evaluates the schedule

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::time::Duration;

use crate::common::constants::REFRESH_SHUTDOWN_WAIT_MS;
use crate::common::subscription::Subscription;
use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::core::{
    GlobalState, HookBroadcaster, RefreshWorker, SwitchCoordinator, SwitchOutcome,
};
use crate::events::{EventRouter, LogNotifier};
use crate::io::dbus::{self, SleepTracker};
use crate::io::instance;
use crate::io::signals::{ServiceMessage, SignalState, setup_signal_handler};
use crate::ipc::{CommandHandler, IpcServer};
use crate::postpone::persist;
use crate::theme::{CommandApplier, Governor, NightLightSignal, NightLightState, SwitchSource};
use crate::time::RealTimeSource;

/// Shortest sleep of the main loop, so a boundary reached a hair early does
/// not spin.
const MINIMUM_WAKEUP: Duration = Duration::from_millis(100);

/// Builder for running the service.
pub struct Service {
    debug_enabled: bool,
    create_lock: bool,
}

impl Service {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
        }
    }

    /// Run without the single-instance lock.
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    pub fn run(self) -> Result<()> {
        log_version!();

        let config = Config::load().context("Configuration failed")?;

        let _lock = if self.create_lock {
            match instance::ensure_single_instance()? {
                Some(lock) => Some(lock),
                None => {
                    log_pipe!();
                    match instance::get_running_instance() {
                        Some(info) => log_error!("duskswitch is already running (PID {})", info.pid),
                        None => log_error!("duskswitch is already running"),
                    }
                    log_indented!("Use 'duskswitch stop' to stop it or 'duskswitch reload' to reload it");
                    log_end!();
                    return Ok(());
                }
            }
        } else {
            None
        };

        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", private_path(&custom_dir));
        }

        let signal_state = setup_signal_handler(self.debug_enabled)?;
        config.log_config();

        let mut runtime = Runtime::start(config, &signal_state, self.debug_enabled)?;
        log_block_start!("Lock acquired, starting duskswitch...");

        runtime.evaluate(SwitchSource::Startup);
        runtime.main_loop(&signal_state);
        runtime.shutdown();

        log_end!();
        Ok(())
    }
}

/// Everything the main loop owns while the service runs.
struct Runtime {
    config: Config,
    state: Arc<GlobalState>,
    coordinator: Arc<SwitchCoordinator>,
    router: Arc<EventRouter>,
    applier: Arc<CommandApplier>,
    broadcaster: Arc<HookBroadcaster>,
    worker: RefreshWorker,
    night_light: NightLightState,
    ipc: Option<IpcServer>,
    ipc_timeout: Arc<AtomicU64>,
    sender: Sender<ServiceMessage>,
    monitors: Monitors,
    _queue_cleared: Subscription,
    debug_enabled: bool,
}

/// OS monitor subscriptions. Dropping one stops its monitor.
#[derive(Default)]
struct Monitors {
    power: Option<Subscription>,
    night_light: Option<Subscription>,
    session: Option<Subscription>,
    sleep: Option<Subscription>,
    time: Option<Subscription>,
}

impl Runtime {
    fn start(config: Config, signal_state: &SignalState, debug_enabled: bool) -> Result<Self> {
        let sender = signal_state.sender.clone();

        let state = Arc::new(GlobalState::new(
            RealTimeSource::shared(),
            config.engine_settings()?,
            config.auto_switch(),
        ));
        learn_theme_names(&state, &config);

        let broadcaster = Arc::new(HookBroadcaster::new(
            config.refresh_command().map(str::to_string),
            config.refresh_timeout(),
        ));
        let worker =
            RefreshWorker::start(broadcaster.clone(), config.refresh_timeout(), debug_enabled)
                .context("Failed to start refresh worker")?;

        let applier = Arc::new(CommandApplier::new(
            config.light_command().to_string(),
            config.dark_command().to_string(),
            debug_enabled,
        ));

        let night_light = NightLightState::new(false);
        let coordinator = Arc::new(SwitchCoordinator::new(
            state.clone(),
            applier.clone(),
            Arc::new(night_light.clone()),
            worker.queue(),
            debug_enabled,
        ));
        let router = Arc::new(EventRouter::new(
            coordinator.clone(),
            Arc::new(LogNotifier),
            night_light.clone(),
            debug_enabled,
        ));

        restore_postpones(&state, &config, &night_light);

        let wake = sender.clone();
        let queue_cleared = state.postpones().on_queue_cleared(move || {
            let _ = wake.send(ServiceMessage::Wake);
        });

        let ipc_timeout = Arc::new(AtomicU64::new(config.ipc_timeout_ms()));
        let handler = Arc::new(CommandHandler::new(router.clone(), sender.clone()));
        let ipc = match IpcServer::start(handler, ipc_timeout.clone(), debug_enabled) {
            Ok(server) => Some(server),
            Err(e) => {
                log_pipe!();
                log_warning!("Command socket unavailable: {e:#}");
                log_indented!("Client commands will not reach this instance");
                None
            }
        };

        match config::get_config_path() {
            Ok(path) => {
                if let Err(e) = config::start_config_watcher(sender.clone(), path, debug_enabled)
                    && debug_enabled
                {
                    log_pipe!();
                    log_warning!("Config file watching unavailable: {}", e);
                    log_indented!("Hot config reload disabled, use SIGUSR2 for manual reload");
                }
            }
            Err(e) => log_warning!("Could not resolve config path for watching: {e:#}"),
        }

        let mut runtime = Self {
            config,
            state,
            coordinator,
            router,
            applier,
            broadcaster,
            worker,
            night_light,
            ipc,
            ipc_timeout,
            sender,
            monitors: Monitors::default(),
            _queue_cleared: queue_cleared,
            debug_enabled,
        };
        runtime.start_monitors();
        Ok(runtime)
    }

    fn start_monitors(&mut self) {
        let tracker = SleepTracker::new();
        self.monitors.sleep = optional_monitor(
            "Sleep/resume detection",
            dbus::start_sleep_monitor(self.sender.clone(), tracker.clone(), self.debug_enabled),
        );
        self.monitors.time = optional_monitor(
            "Clock change detection",
            dbus::start_time_change_monitor(self.sender.clone(), tracker, self.debug_enabled),
        );
        self.monitors.session = optional_monitor(
            "Session lock detection",
            dbus::start_session_monitor(self.sender.clone()),
        );
        self.sync_optional_monitors();
    }

    /// Start or stop the monitors that only run for some settings.
    fn sync_optional_monitors(&mut self) {
        let want_power = self.config.dark_on_battery();
        if want_power && self.monitors.power.is_none() {
            self.monitors.power = optional_monitor(
                "Battery detection",
                dbus::start_power_monitor(self.sender.clone()),
            );
            self.router
                .set_power_tracking(self.monitors.power.is_some());
        } else if !want_power && self.monitors.power.is_some() {
            self.monitors.power = None;
            self.router.set_power_tracking(false);
        }

        let want_night_light = self.config.governor() == Governor::NightLight;
        if want_night_light && self.monitors.night_light.is_none() {
            self.monitors.night_light = optional_monitor(
                "Night light detection",
                dbus::start_night_light_monitor(self.sender.clone()),
            );
        } else if !want_night_light && self.monitors.night_light.is_some() {
            self.monitors.night_light = None;
        }
    }

    fn evaluate(&self, source: SwitchSource) {
        let outcome = self.coordinator.request_switch(source, None);
        if self.debug_enabled && !matches!(outcome, SwitchOutcome::AlreadyApplied(_)) {
            log_debug!("Evaluation ({}): {:?}", source, outcome);
        }
    }

    fn main_loop(&mut self, signal_state: &SignalState) {
        while signal_state.is_running() {
            let timeout = self.next_wakeup();
            if self.debug_enabled {
                log_debug!("Next evaluation in {}s", timeout.as_secs());
            }

            match signal_state.receiver.recv_timeout(timeout) {
                Ok(ServiceMessage::Shutdown) => {
                    signal_state.request_shutdown();
                    break;
                }
                Ok(ServiceMessage::Reload) => self.reload(),
                Ok(ServiceMessage::Event(event)) => self.router.handle(event),
                Ok(ServiceMessage::Wake) => self.evaluate(SwitchSource::TimeSwitch),
                Err(RecvTimeoutError::Timeout) => self.evaluate(SwitchSource::TimeSwitch),
                Err(RecvTimeoutError::Disconnected) => {
                    log_pipe!();
                    log_error!("Service channel disconnected unexpectedly");
                    break;
                }
            }
        }
    }

    fn next_wakeup(&self) -> Duration {
        let now = self.state.now();
        let settings = self.state.settings();
        let next_boundary = match settings.governor {
            Governor::Default => settings
                .schedule
                .next_boundary(now)
                .ok()
                .map(|boundary| boundary.at),
            Governor::NightLight => None,
        };
        plan_wakeup(
            now,
            next_boundary,
            self.state.postpones().next_expiry(),
            self.config.check_interval(),
        )
    }

    fn reload(&mut self) {
        log_block_start!("Reloading configuration");

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_warning!("Reload failed: {e:#}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };
        let settings = match config.engine_settings() {
            Ok(settings) => settings,
            Err(e) => {
                log_warning!("Reload failed: {e:#}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };

        self.state.replace_settings(settings);
        self.applier.set_commands(
            config.light_command().to_string(),
            config.dark_command().to_string(),
        );
        self.broadcaster.set_command(
            config.refresh_command().map(str::to_string),
            config.refresh_timeout(),
        );
        self.ipc_timeout
            .store(config.ipc_timeout_ms(), Ordering::SeqCst);
        learn_theme_names(&self.state, &config);

        // The hotkey toggle is runtime state; only an edited setting overrides it
        if config.auto_switch() != self.config.auto_switch() {
            self.state.set_auto_switch_enabled(config.auto_switch());
        }

        let previous = std::mem::replace(&mut self.config, config);
        self.sync_optional_monitors();
        if previous.governor() != self.config.governor() || previous.schedule_changed(&self.config)
        {
            self.router.retarget_skip();
        }

        self.config.log_config();
        self.evaluate(SwitchSource::ConfigChange);
    }

    fn shutdown(self) {
        log_block_start!("Shutting down duskswitch...");

        if let Some(ipc) = self.ipc {
            ipc.shutdown();
        }
        drop(self.monitors);

        match persist::default_path() {
            Ok(path) => match persist::save(
                &path,
                self.state.postpones(),
                self.coordinator.last_applied(),
            ) {
                Ok(0) => {}
                Ok(count) => log_decorated!("Saved {} postpone(s) for the next start", count),
                Err(e) => log_warning!("Could not save postpones: {e:#}"),
            },
            Err(e) => log_warning!("Could not save postpones: {e:#}"),
        }

        let discarded = self
            .worker
            .shutdown(Duration::from_millis(REFRESH_SHUTDOWN_WAIT_MS));
        if discarded > 0 && self.debug_enabled {
            log_debug!("Discarded {} pending refresh job(s)", discarded);
        }
        drop(self.night_light);
    }
}

impl Config {
    /// Whether sun times or offsets differ from `other`.
    fn schedule_changed(&self, other: &Config) -> bool {
        self.sunrise != other.sunrise
            || self.sunset != other.sunset
            || self.sunrise_offset != other.sunrise_offset
            || self.sunset_offset != other.sunset_offset
            || self.coordinates() != other.coordinates()
    }
}

/// Time until the next boundary or expiry, capped at `check_interval`.
pub fn plan_wakeup(
    now: DateTime<Local>,
    next_boundary: Option<DateTime<Local>>,
    next_expiry: Option<DateTime<Local>>,
    check_interval: Duration,
) -> Duration {
    [next_boundary, next_expiry]
        .into_iter()
        .flatten()
        .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
        .fold(check_interval, Duration::min)
        .max(MINIMUM_WAKEUP)
}

fn optional_monitor(name: &str, result: Result<Subscription>) -> Option<Subscription> {
    match result {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            log_pipe!();
            log_warning!("{} unavailable: {e:#}", name);
            log_indented!("duskswitch will continue without it");
            None
        }
    }
}

fn learn_theme_names(state: &GlobalState, config: &Config) {
    state.learn_theme_name("light", config.light_command());
    state.learn_theme_name("dark", config.dark_command());
}

fn restore_postpones(state: &GlobalState, config: &Config, night_light: &NightLightState) {
    let path = match persist::default_path() {
        Ok(path) => path,
        Err(e) => {
            log_warning!("Could not locate saved postpones: {e:#}");
            return;
        }
    };
    let night_light_active =
        (config.governor() == Governor::NightLight).then(|| night_light.is_active());
    persist::restore_from_disk(&path, state.postpones(), state.now(), night_light_active);
}
