//! Test doubles and a fully wired engine on a manual clock.
//!
//! Compiled for unit tests and for integration tests through the
//! `testing-support` feature.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::logger::Log;
use crate::common::utils::lock;
use crate::core::{
    Broadcaster, EngineSettings, GlobalState, RefreshJob, RefreshWorker, SwitchCoordinator,
};
use crate::events::{EventRouter, LogNotifier};
use crate::geo::{ManualSunTimes, Schedule, SunOffsets};
use crate::theme::{Governor, NightLightState, Theme, ThemeApplier};
use crate::time::ManualTimeSource;

/// Applier that counts calls and can be slowed down or made to fail.
#[derive(Default)]
pub struct CountingApplier {
    applied: Mutex<Vec<Theme>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Duration>,
}

impl CountingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every apply sleep for `delay` first.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Themes applied successfully, in order.
    pub fn applied(&self) -> Vec<Theme> {
        lock(&self.applied).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.applied).len()
    }

    /// Highest number of applies that ever ran at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ThemeApplier for CountingApplier {
    fn apply(&self, theme: Theme) -> Result<()> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let result = if self.failing.load(Ordering::SeqCst) {
            Err(anyhow::anyhow!("apply of {theme} failed"))
        } else {
            lock(&self.applied).push(theme);
            Ok(())
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Broadcaster that records every job it ran.
#[derive(Default)]
pub struct RecordingBroadcaster {
    jobs: Mutex<Vec<RefreshJob>>,
    delay: Mutex<Duration>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every broadcast block for `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = delay;
        self
    }

    pub fn jobs(&self) -> Vec<RefreshJob> {
        lock(&self.jobs).clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, job: &RefreshJob) -> Result<()> {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        lock(&self.jobs).push(*job);
        Ok(())
    }
}

/// A coordinator and router on a manual clock, with sunrise 07:00 and sunset
/// 19:00.
pub struct TestEngine {
    pub clock: Arc<ManualTimeSource>,
    pub applier: Arc<CountingApplier>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub night_light: NightLightState,
    pub coordinator: Arc<SwitchCoordinator>,
    pub router: Arc<EventRouter>,
    worker: Option<RefreshWorker>,
}

impl TestEngine {
    pub fn new(now: DateTime<Local>) -> Self {
        Self::with_applier(now, CountingApplier::new())
    }

    pub fn with_applier(now: DateTime<Local>, applier: CountingApplier) -> Self {
        Self::with_parts(now, applier, RecordingBroadcaster::new())
    }

    pub fn with_parts(
        now: DateTime<Local>,
        applier: CountingApplier,
        broadcaster: RecordingBroadcaster,
    ) -> Self {
        Log::set_enabled(false);
        let clock = Arc::new(ManualTimeSource::new(now));
        let state = Arc::new(GlobalState::new(clock.clone(), default_settings(), true));

        let broadcaster = Arc::new(broadcaster);
        let worker = RefreshWorker::start(broadcaster.clone(), Duration::from_secs(1), false)
            .unwrap_or_else(|e| panic!("refresh worker failed to start: {e}"));

        let applier = Arc::new(applier);
        let night_light = NightLightState::new(false);
        let coordinator = Arc::new(SwitchCoordinator::new(
            state,
            applier.clone(),
            Arc::new(night_light.clone()),
            worker.queue(),
            false,
        ));
        let router = Arc::new(EventRouter::new(
            coordinator.clone(),
            Arc::new(LogNotifier),
            night_light.clone(),
            false,
        ));

        Self {
            clock,
            applier,
            broadcaster,
            night_light,
            coordinator,
            router,
            worker: Some(worker),
        }
    }

    pub fn state(&self) -> &Arc<GlobalState> {
        self.coordinator.state()
    }

    /// Change the engine settings in place.
    pub fn update_settings(&self, f: impl FnOnce(&mut EngineSettings)) {
        let mut settings = self.state().settings();
        f(&mut settings);
        self.state().replace_settings(settings);
    }

    /// Stop the refresh worker, waiting up to `wait` for a running job.
    pub fn stop_worker(&mut self, wait: Duration) -> usize {
        self.worker
            .take()
            .map(|worker| worker.shutdown(wait))
            .unwrap_or(0)
    }
}

pub fn default_settings() -> EngineSettings {
    let manual = ManualSunTimes::new(
        chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
        chrono::NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
    );
    EngineSettings {
        governor: Governor::Default,
        schedule: Schedule::new(Arc::new(manual), SunOffsets::default()),
        dark_on_battery: false,
        auto_switch_notify: false,
        notify_grace: chrono::Duration::minutes(2),
        time_change_debounce: Duration::from_millis(1000),
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
