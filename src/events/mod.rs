//! Event adapters.
//!
//! OS monitors (see [`crate::io::dbus`]) and the IPC server produce
//! [`SystemEvent`]s; the [`EventRouter`] turns each one into calls on the
//! switch coordinator, the postpone store and the global state. The router
//! owns no theme logic of its own.

mod clock;
mod hotkey;
mod night_light;
mod power;
mod resume;
mod session;

pub use clock::ClockWatch;
pub use hotkey::HotkeyAction;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::SwitchCoordinator;
use crate::theme::{NightLightState, Theme};

/// A translated OS signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    PowerChanged { on_battery: bool },
    SessionLocked,
    SessionUnlocked,
    TimeChanged,
    Sleeping,
    Resumed,
    NightLightChanged { active: bool },
    Hotkey(HotkeyAction),
}

/// Hook for asking the user before an automatic switch.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Tell the user the schedule wants `target` and automatic switching is
    /// holding off for the grace period.
    fn prompt_switch(&self, target: Theme);
}

/// Notifier that only logs the prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn prompt_switch(&self, target: Theme) {
        log_pipe!();
        log_info!("The schedule wants the {} theme", target);
        log_indented!("Run 'duskswitch {}' to switch now or 'duskswitch skip' to stay", target);
    }
}

pub struct EventRouter {
    coordinator: Arc<SwitchCoordinator>,
    notifier: Arc<dyn Notifier>,
    night_light: NightLightState,
    clock: Mutex<ClockWatch>,
    /// Set by the first night-light flip after a skip was requested.
    skip_flip_seen: AtomicBool,
    power_tracking: AtomicBool,
    debug_enabled: bool,
}

impl EventRouter {
    pub fn new(
        coordinator: Arc<SwitchCoordinator>,
        notifier: Arc<dyn Notifier>,
        night_light: NightLightState,
        debug_enabled: bool,
    ) -> Self {
        let clock = ClockWatch::new(coordinator.state().now());
        Self {
            coordinator,
            notifier,
            night_light,
            clock: Mutex::new(clock),
            skip_flip_seen: AtomicBool::new(false),
            power_tracking: AtomicBool::new(false),
            debug_enabled,
        }
    }

    pub fn coordinator(&self) -> &Arc<SwitchCoordinator> {
        &self.coordinator
    }

    /// Dispatch one event. Runs on the caller's thread.
    pub fn handle(&self, event: SystemEvent) {
        if self.debug_enabled {
            log_debug!("Event: {:?}", event);
        }
        match event {
            SystemEvent::PowerChanged { on_battery } => self.on_power_changed(on_battery),
            SystemEvent::SessionLocked => self.on_session_locked(),
            SystemEvent::SessionUnlocked => self.on_session_unlocked(),
            SystemEvent::TimeChanged => self.on_time_changed(),
            SystemEvent::Sleeping => {
                if self.debug_enabled {
                    log_debug!("System going to sleep");
                }
            }
            SystemEvent::Resumed => self.on_resumed(),
            SystemEvent::NightLightChanged { active } => self.on_night_light_changed(active),
            SystemEvent::Hotkey(action) => {
                self.on_hotkey(action);
            }
        }
    }

    fn reset_skip_flip(&self) {
        self.skip_flip_seen.store(false, Ordering::SeqCst);
    }
}
