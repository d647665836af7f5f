//! Night-light tracking for the NightLight governor.

use std::sync::atomic::Ordering;

use super::EventRouter;
use crate::theme::{Governor, SwitchSource, Theme};

impl EventRouter {
    pub(super) fn on_night_light_changed(&self, active: bool) {
        let state = self.coordinator.state();
        let requested = if active { Theme::Dark } else { Theme::Light };

        let changed = self.night_light.set(active);
        if !changed && state.night_light_requested() == requested {
            return;
        }
        state.set_night_light_requested(requested);

        if state.governor() != Governor::NightLight {
            return;
        }

        // A skip covers one flip: the first flip is the skipped switch, the
        // second one ends the skip
        let postpones = state.postpones();
        let skip_active = postpones.is_skip_next_switch();
        let flip_seen = self.skip_flip_seen.load(Ordering::SeqCst);
        match (skip_active, flip_seen) {
            (true, false) => {
                self.skip_flip_seen.store(true, Ordering::SeqCst);
                log_decorated!("Night light turned {}, switch skipped", on_off(active));
            }
            (true, true) => {
                self.reset_skip_flip();
                postpones.remove_skip_next();
                log_decorated!("Night light turned {}, skip finished", on_off(active));
            }
            (false, true) => self.reset_skip_flip(),
            (false, false) => {
                log_decorated!("Night light turned {}", on_off(active));
            }
        }

        self.coordinator
            .request_switch(SwitchSource::NightLightTracker, None);
    }
}

fn on_off(active: bool) -> &'static str {
    if active { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::super::SystemEvent;
    use super::super::test_support::{at, harness, quiet};
    use crate::postpone::SkipTarget;
    use crate::theme::{Governor, NightLightSignal, Theme};

    #[test]
    fn test_night_light_drives_theme() {
        let h = harness(at(1, 12, 0), quiet());
        h.set_governor(Governor::NightLight);

        h.router.handle(SystemEvent::NightLightChanged { active: false });
        h.router.handle(SystemEvent::NightLightChanged { active: true });
        h.router.handle(SystemEvent::NightLightChanged { active: true });

        assert_eq!(h.applied(), vec![Theme::Light, Theme::Dark]);
        assert_eq!(h.state().night_light_requested(), Theme::Dark);
    }

    #[test]
    fn test_skip_is_consumed_on_second_flip() {
        let h = harness(at(1, 12, 0), quiet());
        h.set_governor(Governor::NightLight);
        h.router.handle(SystemEvent::NightLightChanged { active: false });
        h.state()
            .postpones()
            .add_skip_next(SkipTarget::for_night_light(Theme::Light));

        h.router.handle(SystemEvent::NightLightChanged { active: true });
        assert!(h.state().postpones().is_skip_next_switch());
        assert_eq!(h.applied(), vec![Theme::Light]);

        h.router.handle(SystemEvent::NightLightChanged { active: false });
        assert!(!h.state().postpones().is_skip_next_switch());
        assert_eq!(h.applied(), vec![Theme::Light]);

        h.router.handle(SystemEvent::NightLightChanged { active: true });
        assert_eq!(h.applied(), vec![Theme::Light, Theme::Dark]);
    }

    #[test]
    fn test_default_governor_only_tracks() {
        let h = harness(at(1, 12, 0), quiet());
        h.router.handle(SystemEvent::NightLightChanged { active: true });
        assert_eq!(h.state().night_light_requested(), Theme::Dark);
        assert!(h.applied().is_empty());
        assert!(h.night_light.is_active());
    }
}
