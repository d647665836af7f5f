//! Maps IPC commands onto the engine.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use super::{ApiResponse, Command, RequestHandler};
use crate::common::constants::MAXIMUM_DELAY_MINUTES;
use crate::core::SwitchOutcome;
use crate::events::{EventRouter, HotkeyAction};
use crate::io::signals::ServiceMessage;
use crate::postpone::{PostponeItem, PostponeQueueDto};
use crate::theme::{Governor, SwitchSource, Theme};

/// Everything `duskswitch status` shows, sent as the `details` of a `status`
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub requested: Theme,
    pub applied: Theme,
    pub forced: Theme,
    pub governor: Governor,
    pub auto_switch_enabled: bool,
    pub on_battery: bool,
    pub night_light_active: bool,
    pub scheduled: Option<Theme>,
    pub next_switch: Option<DateTime<Local>>,
    pub postponed: bool,
    pub postpones: PostponeQueueDto,
}

/// Handles commands on behalf of the running service.
///
/// Anything that changes postpones or settings nudges the service loop with
/// [`ServiceMessage::Wake`] so it re-plans its next wakeup.
pub struct CommandHandler {
    router: Arc<EventRouter>,
    sender: Sender<ServiceMessage>,
}

impl CommandHandler {
    pub fn new(router: Arc<EventRouter>, sender: Sender<ServiceMessage>) -> Self {
        Self { router, sender }
    }

    fn wake(&self) {
        let _ = self.sender.send(ServiceMessage::Wake);
    }

    fn switch_response(outcome: SwitchOutcome) -> ApiResponse {
        match outcome {
            SwitchOutcome::Applied(theme) | SwitchOutcome::AlreadyApplied(theme) => {
                ApiResponse::ok().with_message(theme.as_str())
            }
            SwitchOutcome::Suppressed => ApiResponse::ok().with_message("postponed"),
            SwitchOutcome::Ignored => ApiResponse::ok().with_message("auto switching disabled"),
            SwitchOutcome::Debounced => ApiResponse::ok(),
            SwitchOutcome::Failed(theme) => {
                ApiResponse::err(format!("Failed to apply the {theme} theme"))
            }
            SwitchOutcome::Unresolved => ApiResponse::err("Could not determine the target theme"),
        }
    }

    fn force(&self, theme: Theme) -> ApiResponse {
        let coordinator = self.router.coordinator();
        coordinator.state().set_forced_theme(theme);
        let outcome = coordinator.request_switch(SwitchSource::Api, Some(theme));
        self.wake();
        Self::switch_response(outcome)
    }

    fn toggle_skip_next(&self) -> ApiResponse {
        let coordinator = self.router.coordinator();
        let target = match coordinator.skip_target(Theme::Unknown) {
            Ok(target) => target,
            Err(e) => return ApiResponse::err(format!("Could not compute skip: {e}")),
        };
        let enabled = coordinator.state().postpones().toggle_skip_next(target);
        if !enabled {
            coordinator.request_switch(SwitchSource::Api, None);
        }
        self.wake();
        ApiResponse::ok().with_message(enabled.to_string())
    }

    fn delay_by(&self, minutes: i64) -> ApiResponse {
        if !(1..=MAXIMUM_DELAY_MINUTES).contains(&minutes) {
            return ApiResponse::err(format!(
                "Delay must be between 1 and {MAXIMUM_DELAY_MINUTES} minutes, got {minutes}"
            ));
        }
        let state = self.router.coordinator().state();
        let Some(item) = PostponeItem::delay(state.now(), minutes) else {
            return ApiResponse::err(format!("A delay of {minutes} minutes is out of range"));
        };
        log_pipe!();
        log_info!("Delaying automatic switching by {} minutes", minutes);
        state.postpones().add(item);
        self.wake();
        ApiResponse::ok()
    }

    fn postpone_status(&self) -> ApiResponse {
        let postpones = self.router.coordinator().state().postpones();
        let postponed = postpones.is_postponed();
        match serde_json::to_string(&postpones.snapshot_dto()) {
            Ok(details) => ApiResponse::ok()
                .with_message(postponed.to_string())
                .with_details(details),
            Err(e) => ApiResponse::err(format!("Failed to serialize postpone queue: {e}")),
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let coordinator = self.router.coordinator();
        let state = coordinator.state();
        let status = coordinator.status();
        let settings = state.settings();

        let next_switch = match settings.governor {
            Governor::Default => settings
                .schedule
                .next_boundary(state.now())
                .ok()
                .map(|boundary| boundary.at),
            Governor::NightLight => None,
        };

        StatusReport {
            requested: status.requested,
            applied: status.applied,
            forced: status.forced,
            governor: settings.governor,
            auto_switch_enabled: state.auto_switch_enabled(),
            on_battery: state.on_battery(),
            night_light_active: coordinator.night_light_active(),
            scheduled: coordinator.scheduled_theme().ok(),
            next_switch,
            postponed: state.postpones().is_postponed(),
            postpones: state.postpones().snapshot_dto(),
        }
    }
}

impl RequestHandler for CommandHandler {
    fn handle(&self, command: Command) -> ApiResponse {
        let coordinator = self.router.coordinator();
        let state = coordinator.state();

        match command {
            Command::RequestSwitch => {
                log_pipe!();
                log_info!("Switch requested over IPC");
                Self::switch_response(coordinator.request_switch(SwitchSource::Manual, None))
            }
            Command::Switch => {
                let theme = coordinator.switch_auto_pause(None, SwitchSource::Api);
                self.wake();
                ApiResponse::ok().with_message(theme.as_str())
            }
            Command::Light | Command::Dark => {
                let target = if command == Command::Light {
                    Theme::Light
                } else {
                    Theme::Dark
                };
                let theme = coordinator.switch_auto_pause(Some(target), SwitchSource::Api);
                self.wake();
                ApiResponse::ok().with_message(theme.as_str())
            }
            Command::ForceLight => self.force(Theme::Light),
            Command::ForceDark => self.force(Theme::Dark),
            Command::NoForce => self.force(Theme::Unknown),
            Command::ToggleSkipNext => self.toggle_skip_next(),
            Command::GetPostponeStatus => self.postpone_status(),
            Command::ClearPostponeQueue => {
                let removed = state.postpones().remove_user_clearable();
                self.wake();
                ApiResponse::ok().with_message(removed.to_string())
            }
            Command::DelayBy { minutes } => self.delay_by(minutes),
            Command::GetRequestedTheme => {
                ApiResponse::ok().with_message(state.requested_theme().as_str())
            }
            Command::GetLearnedThemeNames => {
                match serde_json::to_string(&state.learned_theme_names()) {
                    Ok(details) => ApiResponse::ok().with_details(details),
                    Err(e) => ApiResponse::err(format!("Failed to serialize theme names: {e}")),
                }
            }
            Command::Hotkey { action } => {
                let message = self.router.on_hotkey(action);
                if action != HotkeyAction::ToggleTheme {
                    self.wake();
                }
                ApiResponse::ok().with_message(message)
            }
            Command::Status => match serde_json::to_string(&self.status_report()) {
                Ok(details) => ApiResponse::ok().with_details(details),
                Err(e) => ApiResponse::err(format!("Failed to serialize status: {e}")),
            },
            Command::Alive => ApiResponse::ok().with_message("alive"),
            Command::Shutdown => {
                log_pipe!();
                log_info!("Shutdown requested over IPC");
                let _ = self.sender.send(ServiceMessage::Shutdown);
                ApiResponse::ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::{Harness, at, harness, quiet};
    use crate::ipc::StatusCode;
    use std::sync::mpsc::{self, Receiver};

    fn handler(h: Harness) -> (Harness, CommandHandler, Receiver<ServiceMessage>) {
        let (sender, receiver) = mpsc::channel();
        let router = Arc::new(EventRouter::new(
            h.router.coordinator().clone(),
            quiet(),
            h.night_light.clone(),
            false,
        ));
        (h, CommandHandler::new(router, sender), receiver)
    }

    #[test]
    fn test_delay_by_rejects_non_positive() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        let response = handler.handle(Command::DelayBy { minutes: 0 });
        assert_eq!(response.status_code, StatusCode::Err);
        assert!(!h.state().postpones().is_user_delayed());
    }

    #[test]
    fn test_delay_by_rejects_out_of_range_minutes() {
        let (h, handler, rx) = handler(harness(at(1, 12, 0), quiet()));
        let request = r#"{"command":"delay_by","minutes":9223372036854775807}"#;
        let response = handler.handle(serde_json::from_str(request).unwrap());
        assert_eq!(response.status_code, StatusCode::Err);

        let response = handler.handle(Command::DelayBy {
            minutes: MAXIMUM_DELAY_MINUTES + 1,
        });
        assert_eq!(response.status_code, StatusCode::Err);
        assert!(!h.state().postpones().is_user_delayed());
        assert!(rx.try_recv().is_err());

        let response = handler.handle(Command::DelayBy {
            minutes: MAXIMUM_DELAY_MINUTES,
        });
        assert!(response.is_ok());
    }

    #[test]
    fn test_delay_by_adds_delay_and_wakes() {
        let (h, handler, rx) = handler(harness(at(1, 12, 0), quiet()));
        let response = handler.handle(Command::DelayBy { minutes: 30 });
        assert!(response.is_ok());
        assert!(h.state().postpones().is_user_delayed());
        assert_eq!(rx.try_recv().unwrap(), ServiceMessage::Wake);
    }

    #[test]
    fn test_toggle_skip_next_round_trip() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        let first = handler.handle(Command::ToggleSkipNext);
        assert_eq!(first.message.as_deref(), Some("true"));
        assert!(h.state().postpones().is_skip_next_switch());

        let second = handler.handle(Command::ToggleSkipNext);
        assert_eq!(second.message.as_deref(), Some("false"));
        assert!(!h.state().postpones().is_skip_next_switch());
    }

    #[test]
    fn test_postpone_status_details_are_dto_json() {
        let (_h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        handler.handle(Command::DelayBy { minutes: 10 });

        let response = handler.handle(Command::GetPostponeStatus);
        assert_eq!(response.message.as_deref(), Some("true"));
        let dto: PostponeQueueDto =
            serde_json::from_str(response.details.as_deref().unwrap()).unwrap();
        assert_eq!(dto.items.len(), 1);
        assert_eq!(dto.items[0].reason, "DelayAutoSwitch");
    }

    #[test]
    fn test_clear_postpone_queue_keeps_session_lock() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        h.state().postpones().add(PostponeItem::session_lock());
        handler.handle(Command::DelayBy { minutes: 10 });

        let response = handler.handle(Command::ClearPostponeQueue);
        assert_eq!(response.message.as_deref(), Some("1"));
        assert!(h.state().postpones().is_session_locked());
    }

    #[test]
    fn test_light_and_dark_commands() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        let response = handler.handle(Command::Dark);
        assert_eq!(response.message.as_deref(), Some("dark"));
        assert!(h.state().postpones().is_skip_next_switch());

        handler.handle(Command::Light);
        assert!(!h.state().postpones().is_skip_next_switch());
        assert_eq!(h.applied(), vec![Theme::Dark, Theme::Light]);
    }

    #[test]
    fn test_force_commands() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        handler.handle(Command::ForceDark);
        assert_eq!(h.state().forced_theme(), Theme::Dark);

        let response = handler.handle(Command::GetRequestedTheme);
        assert_eq!(response.message.as_deref(), Some("dark"));

        handler.handle(Command::NoForce);
        assert_eq!(h.state().forced_theme(), Theme::Unknown);
        assert_eq!(h.applied(), vec![Theme::Dark, Theme::Light]);
    }

    #[test]
    fn test_status_report() {
        let (h, handler, _rx) = handler(harness(at(1, 12, 0), quiet()));
        handler.handle(Command::RequestSwitch);

        let response = handler.handle(Command::Status);
        let report: StatusReport =
            serde_json::from_str(response.details.as_deref().unwrap()).unwrap();
        assert_eq!(report.applied, Theme::Light);
        assert_eq!(report.scheduled, Some(Theme::Light));
        assert_eq!(report.next_switch, Some(at(1, 19, 0)));
        assert!(!report.postponed);
        drop(h);
    }

    #[test]
    fn test_shutdown_reaches_service_loop() {
        let (_h, handler, rx) = handler(harness(at(1, 12, 0), quiet()));
        assert!(handler.handle(Command::Shutdown).is_ok());
        assert_eq!(rx.try_recv().unwrap(), ServiceMessage::Shutdown);
    }
}
