//! The switch coordinator.
//!
//! Every theme change in the process goes through [`SwitchCoordinator::request_switch`].
//! A single switch mutex covers decision and apply together, so at most one
//! apply is ever in flight and a decision never races the marker it reads.
//! The mutex guards the last-applied marker itself.
//!
//! Decision order inside the mutex:
//!
//! 1. an automatic request (no explicit theme) is suppressed while a skip,
//!    a user delay, a session lock or a switch-prompt grace period is active
//! 2. the forced theme wins
//! 3. `dark_on_battery` on battery means Dark
//! 4. the explicit theme of a manual request
//! 5. automatic requests are ignored while auto switching is off
//! 6. the resolver
//!
//! then the idempotence guard, the apply, the marker and the refresh job.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::refresh::{RefreshJob, RefreshQueue};
use super::state::GlobalState;
use crate::common::utils::lock;
use crate::postpone::{DELAY_AUTO_SWITCH, SkipTarget};
use crate::theme::{Governor, NightLightSignal, SwitchSource, Theme, ThemeApplier, resolve};

/// What a switch request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The applier ran and succeeded.
    Applied(Theme),
    /// The target was already on screen.
    AlreadyApplied(Theme),
    /// An automatic request arrived while automatic switching was postponed.
    Suppressed,
    /// Automatic switching is disabled.
    Ignored,
    /// A duplicate time-change notification.
    Debounced,
    /// The applier failed; the marker is unchanged so the next request retries.
    Failed(Theme),
    /// No target could be computed.
    Unresolved,
}

impl SwitchOutcome {
    pub fn theme(&self) -> Option<Theme> {
        match self {
            SwitchOutcome::Applied(theme)
            | SwitchOutcome::AlreadyApplied(theme)
            | SwitchOutcome::Failed(theme) => Some(*theme),
            _ => None,
        }
    }
}

/// Snapshot of the coordinator's view of the themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchStatus {
    pub requested: Theme,
    pub applied: Theme,
    pub forced: Theme,
}

pub struct SwitchCoordinator {
    state: Arc<GlobalState>,
    applier: Arc<dyn ThemeApplier>,
    night_light: Arc<dyn NightLightSignal>,
    refresh: RefreshQueue,
    applied: Mutex<Theme>,
    last_time_change: Mutex<Option<Instant>>,
    debug_enabled: bool,
}

impl SwitchCoordinator {
    pub fn new(
        state: Arc<GlobalState>,
        applier: Arc<dyn ThemeApplier>,
        night_light: Arc<dyn NightLightSignal>,
        refresh: RefreshQueue,
        debug_enabled: bool,
    ) -> Self {
        Self {
            state,
            applier,
            night_light,
            refresh,
            applied: Mutex::new(Theme::Unknown),
            last_time_change: Mutex::new(None),
            debug_enabled,
        }
    }

    pub fn state(&self) -> &Arc<GlobalState> {
        &self.state
    }

    /// Whether the night light is currently active.
    pub fn night_light_active(&self) -> bool {
        self.night_light.is_active()
    }

    /// Ask for a theme switch. Never fails: problems are logged and reported
    /// through the outcome.
    pub fn request_switch(&self, source: SwitchSource, explicit: Option<Theme>) -> SwitchOutcome {
        if source == SwitchSource::SystemTimeChanged && self.is_duplicate_time_change() {
            if self.debug_enabled {
                log_debug!("Duplicate time change notification ignored");
            }
            return SwitchOutcome::Debounced;
        }

        let mut applied = lock(&self.applied);

        let explicit = explicit.filter(|theme| theme.is_known());
        if explicit.is_none()
            && let Some(reason) = self.suppression_reason()
        {
            if self.debug_enabled {
                log_debug!("Automatic switch ({}) suppressed: {}", source, reason);
            }
            return SwitchOutcome::Suppressed;
        }

        let target = match self.choose_target(explicit) {
            Ok(Some(target)) => target,
            Ok(None) => {
                if self.debug_enabled {
                    log_debug!("Automatic switching disabled, ignoring {}", source);
                }
                return SwitchOutcome::Ignored;
            }
            Err(e) => {
                log_pipe!();
                log_error!("Could not determine target theme: {e:#}");
                return SwitchOutcome::Unresolved;
            }
        };

        self.state.set_requested_theme(target);

        if *applied == target {
            return SwitchOutcome::AlreadyApplied(target);
        }

        match self.applier.apply(target) {
            Ok(()) => {
                *applied = target;
                self.refresh.enqueue(RefreshJob::after_apply(source));
                log_info!("Applied {} theme ({})", target, source);
                SwitchOutcome::Applied(target)
            }
            Err(e) => {
                log_pipe!();
                log_error!("Failed to apply {} theme: {e:#}", target);
                log_indented!("Will retry on the next evaluation");
                SwitchOutcome::Failed(target)
            }
        }
    }

    fn is_duplicate_time_change(&self) -> bool {
        let threshold = self.state.settings().time_change_debounce;
        let now = self.state.clock().instant();
        let mut last = lock(&self.last_time_change);
        if let Some(previous) = *last
            && now.saturating_duration_since(previous) < threshold
        {
            return true;
        }
        *last = Some(now);
        false
    }

    fn suppression_reason(&self) -> Option<&'static str> {
        let postpones = self.state.postpones();
        if postpones.is_skip_next_switch() {
            Some("next switch skipped")
        } else if postpones.is_user_delayed() {
            Some("delayed by user")
        } else if postpones.is_session_locked() {
            Some("session locked")
        } else if postpones.is_grace_period() {
            Some("waiting for the user to confirm")
        } else {
            None
        }
    }

    /// `Ok(None)` means automatic switching is off and nothing overrides it.
    fn choose_target(&self, explicit: Option<Theme>) -> Result<Option<Theme>> {
        let forced = self.state.forced_theme();
        if forced.is_known() {
            return Ok(Some(forced));
        }

        let settings = self.state.settings();
        if settings.dark_on_battery && self.state.on_battery() {
            return Ok(Some(Theme::Dark));
        }

        if let Some(theme) = explicit {
            return Ok(Some(theme));
        }

        if !self.state.auto_switch_enabled() {
            return Ok(None);
        }

        self.resolve_now().map(Some)
    }

    /// The resolver's answer for right now, with the current forced theme.
    pub fn resolve_now(&self) -> Result<Theme> {
        let settings = self.state.settings();
        let now = self.state.now();
        let sun = settings.schedule.today(now)?;
        Ok(resolve(
            now,
            settings.governor,
            &sun,
            settings.schedule.offsets(),
            self.night_light.is_active(),
            self.state.forced_theme(),
        ))
    }

    /// The theme the active governor wants right now, ignoring overrides.
    pub fn scheduled_theme(&self) -> Result<Theme> {
        let settings = self.state.settings();
        match settings.governor {
            Governor::Default => settings.schedule.scheduled_theme(self.state.now()),
            Governor::NightLight => Ok(if self.night_light.is_active() {
                Theme::Dark
            } else {
                Theme::Light
            }),
        }
    }

    /// Skip target for the active governor, measured against `current_theme`.
    pub fn skip_target(&self, current_theme: Theme) -> Result<SkipTarget> {
        let settings = self.state.settings();
        match settings.governor {
            Governor::Default => {
                SkipTarget::for_schedule(self.state.now(), &settings.schedule, current_theme)
            }
            Governor::NightLight => Ok(SkipTarget::for_night_light(
                self.state.night_light_requested(),
            )),
        }
    }

    /// Switch to `target` (or away from the current theme) and keep it there
    /// until the schedule agrees again.
    ///
    /// When the schedule already wants `target`, user postpones are cleared
    /// instead. Returns the theme that was requested.
    pub fn switch_auto_pause(&self, target: Option<Theme>, source: SwitchSource) -> Theme {
        let target = match target.filter(|theme| theme.is_known()) {
            Some(theme) => theme,
            None => self.toggle_target(),
        };

        let postpones = self.state.postpones();
        let scheduled = match self.state.governor() {
            Governor::Default => self.scheduled_theme().unwrap_or(Theme::Unknown),
            Governor::NightLight => self.state.night_light_requested(),
        };

        if scheduled != target {
            if !postpones.contains(DELAY_AUTO_SWITCH) {
                match self.skip_target(target) {
                    Ok(skip) => {
                        postpones.add_skip_next(skip);
                    }
                    Err(e) => log_warning!("Could not compute skip for manual switch: {e:#}"),
                }
            }
        } else {
            postpones.remove_user_clearable();
        }

        self.request_switch(source, Some(target));
        target
    }

    fn toggle_target(&self) -> Theme {
        let requested = self.state.requested_theme();
        if requested.is_known() {
            return requested.opposite();
        }
        let applied = self.last_applied();
        if applied.is_known() {
            return applied.opposite();
        }
        self.scheduled_theme()
            .map(Theme::opposite)
            .ok()
            .filter(|theme| theme.is_known())
            .unwrap_or(Theme::Dark)
    }

    pub fn last_applied(&self) -> Theme {
        *lock(&self.applied)
    }

    /// Forget the applied marker so the next request applies unconditionally.
    pub fn reset_marker(&self) {
        *lock(&self.applied) = Theme::Unknown;
    }

    pub fn status(&self) -> SwitchStatus {
        SwitchStatus {
            requested: self.state.requested_theme(),
            applied: self.last_applied(),
            forced: self.state.forced_theme(),
        }
    }

    pub fn refresh_pending(&self) -> usize {
        self.refresh.pending()
    }
}
