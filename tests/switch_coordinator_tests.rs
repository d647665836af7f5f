//! Integration tests for the switch coordinator: serialization, precedence,
//! idempotence, retry and debouncing through the public API.

use chrono::{DateTime, Local, TimeZone};
use std::thread;
use std::time::Duration;

use duskswitch::core::SwitchOutcome;
use duskswitch::postpone::PostponeItem;
use duskswitch::testing::{CountingApplier, RecordingBroadcaster, TestEngine, wait_until};
use duskswitch::theme::{SwitchSource, Theme};

fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 10, hour, minute, 0).unwrap()
}

#[test]
fn test_concurrent_requests_apply_once() {
    let engine = TestEngine::with_applier(
        at(21, 0),
        CountingApplier::new().with_delay(Duration::from_millis(20)),
    );
    let coordinator = engine.coordinator.clone();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            thread::spawn(move || coordinator.request_switch(SwitchSource::TimeSwitch, None))
        })
        .collect();
    let outcomes: Vec<SwitchOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(engine.applier.count(), 1);
    assert_eq!(engine.applier.max_in_flight(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == SwitchOutcome::Applied(Theme::Dark))
            .count(),
        1
    );
    assert!(
        outcomes
            .iter()
            .all(|o| o.theme() == Some(Theme::Dark))
    );
}

#[test]
fn test_mixed_sources_never_overlap_applies() {
    let engine = TestEngine::with_applier(
        at(12, 0),
        CountingApplier::new().with_delay(Duration::from_millis(5)),
    );

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let coordinator = engine.coordinator.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let explicit = if i % 2 == 0 { Theme::Dark } else { Theme::Light };
                    coordinator.request_switch(SwitchSource::Manual, Some(explicit));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.applier.max_in_flight(), 1);
    let applied = engine.applier.applied();
    assert!(applied.windows(2).all(|pair| pair[0] != pair[1]));
    assert_eq!(
        engine.coordinator.last_applied(),
        *applied.last().unwrap()
    );
}

#[test]
fn test_idempotent_requests_enqueue_one_refresh() {
    let engine = TestEngine::new(at(9, 0));

    for _ in 0..5 {
        engine
            .coordinator
            .request_switch(SwitchSource::TimeSwitch, None);
    }

    assert_eq!(engine.applier.applied(), vec![Theme::Light]);
    assert!(wait_until(Duration::from_secs(2), || {
        engine.broadcaster.jobs().len() == 1
    }));
    assert_eq!(engine.broadcaster.jobs()[0].source, SwitchSource::TimeSwitch);
}

#[test]
fn test_precedence_forced_over_battery_over_explicit() {
    let engine = TestEngine::new(at(12, 0));
    engine.update_settings(|s| s.dark_on_battery = true);
    let c = &engine.coordinator;

    c.state().set_on_battery(true);
    assert_eq!(
        c.request_switch(SwitchSource::Manual, Some(Theme::Light)),
        SwitchOutcome::Applied(Theme::Dark)
    );

    c.state().set_forced_theme(Theme::Light);
    assert_eq!(
        c.request_switch(SwitchSource::Manual, Some(Theme::Dark)),
        SwitchOutcome::Applied(Theme::Light)
    );

    c.state().set_forced_theme(Theme::Unknown);
    c.state().set_on_battery(false);
    assert_eq!(
        c.request_switch(SwitchSource::Manual, Some(Theme::Dark)),
        SwitchOutcome::Applied(Theme::Dark)
    );
}

#[test]
fn test_postpone_blocks_automatic_but_not_explicit() {
    let engine = TestEngine::new(at(12, 0));
    let c = &engine.coordinator;
    let now = c.state().now();
    c.state().postpones().add(PostponeItem::delay(now, 30).unwrap());

    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Suppressed
    );
    assert_eq!(engine.applier.count(), 0);

    assert_eq!(
        c.request_switch(SwitchSource::Api, Some(Theme::Dark)),
        SwitchOutcome::Applied(Theme::Dark)
    );
}

#[test]
fn test_unknown_explicit_is_treated_as_automatic() {
    let engine = TestEngine::new(at(12, 0));
    let c = &engine.coordinator;
    c.state().postpones().add(PostponeItem::session_lock());

    assert_eq!(
        c.request_switch(SwitchSource::Manual, Some(Theme::Unknown)),
        SwitchOutcome::Suppressed
    );
}

#[test]
fn test_auto_switch_disabled_ignores_automatic_requests() {
    let engine = TestEngine::new(at(12, 0));
    let c = &engine.coordinator;
    c.state().set_auto_switch_enabled(false);

    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Ignored
    );
    assert_eq!(
        c.request_switch(SwitchSource::Manual, Some(Theme::Dark)),
        SwitchOutcome::Applied(Theme::Dark)
    );
}

#[test]
fn test_failed_apply_retries_on_next_request() {
    let engine = TestEngine::new(at(21, 0));
    let c = &engine.coordinator;

    engine.applier.set_failing(true);
    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Failed(Theme::Dark)
    );
    assert_eq!(c.last_applied(), Theme::Unknown);

    engine.applier.set_failing(false);
    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Applied(Theme::Dark)
    );
}

#[test]
fn test_time_change_debounce() {
    let engine = TestEngine::new(at(12, 0));
    let c = &engine.coordinator;

    assert_eq!(
        c.request_switch(SwitchSource::SystemTimeChanged, None),
        SwitchOutcome::Applied(Theme::Light)
    );
    assert_eq!(
        c.request_switch(SwitchSource::SystemTimeChanged, None),
        SwitchOutcome::Debounced
    );

    engine.clock.advance(Duration::from_millis(1500));
    assert_eq!(
        c.request_switch(SwitchSource::SystemTimeChanged, None),
        SwitchOutcome::AlreadyApplied(Theme::Light)
    );
}

#[test]
fn test_schedule_follows_clock() {
    let engine = TestEngine::new(at(18, 59));
    let c = &engine.coordinator;

    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Applied(Theme::Light)
    );
    engine.clock.set(at(19, 0));
    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Applied(Theme::Dark)
    );
    assert_eq!(engine.applier.applied(), vec![Theme::Light, Theme::Dark]);
}

#[test]
fn test_manual_switch_holds_until_next_boundary() {
    let engine = TestEngine::new(at(12, 0));
    let c = &engine.coordinator;
    c.request_switch(SwitchSource::TimeSwitch, None);

    assert_eq!(c.switch_auto_pause(None, SwitchSource::Api), Theme::Dark);
    assert!(c.state().postpones().is_skip_next_switch());
    assert_eq!(
        c.request_switch(SwitchSource::TimeSwitch, None),
        SwitchOutcome::Suppressed
    );
    assert_eq!(c.last_applied(), Theme::Dark);
}

#[test]
fn test_slow_refresh_does_not_block_switching() {
    let mut engine = TestEngine::with_parts(
        at(12, 0),
        CountingApplier::new(),
        RecordingBroadcaster::new().with_delay(Duration::from_millis(400)),
    );
    let c = engine.coordinator.clone();

    let started = std::time::Instant::now();
    c.request_switch(SwitchSource::Manual, Some(Theme::Dark));
    c.request_switch(SwitchSource::Manual, Some(Theme::Light));
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(engine.applier.count(), 2);

    // Both jobs stay queued in order behind the slow first broadcast
    assert!(wait_until(Duration::from_secs(3), || {
        engine.broadcaster.jobs().len() == 2
    }));
    assert_eq!(engine.stop_worker(Duration::from_millis(100)), 0);
}
