//! Target theme resolution.
//!
//! A pure function of its inputs: it reads no shared state and may be called
//! any number of times.

use chrono::{DateTime, Local};

use super::{Governor, Theme};
use crate::geo::{SunOffsets, SunTimes};

/// Decide which theme should be on screen at `now`.
///
/// Precedence:
/// 1. a forced theme wins outright
/// 2. the NightLight governor follows the night-light signal
/// 3. the Default governor compares `now` against today's offset boundaries
///
/// `sun` must hold the sunrise/sunset of `now`'s local date.
pub fn resolve(
    now: DateTime<Local>,
    governor: Governor,
    sun: &SunTimes,
    offsets: SunOffsets,
    night_light_active: bool,
    forced: Theme,
) -> Theme {
    if forced.is_known() {
        return forced;
    }

    match governor {
        Governor::NightLight => {
            if night_light_active {
                Theme::Dark
            } else {
                Theme::Light
            }
        }
        Governor::Default => {
            let light_start = offsets.light_start(sun);
            let dark_start = offsets.dark_start(sun);
            resolve_window(now, light_start, dark_start)
        }
    }
}

fn resolve_window(
    now: DateTime<Local>,
    light_start: DateTime<Local>,
    dark_start: DateTime<Local>,
) -> Theme {
    let light = if light_start < dark_start {
        light_start <= now && now < dark_start
    } else {
        // Offsets pushed the boundaries past each other: the comparison is
        // swapped and an empty window leaves the whole day dark.
        dark_start <= now && now < light_start
    };

    if light { Theme::Light } else { Theme::Dark }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    fn sun() -> SunTimes {
        SunTimes {
            sunrise: at(7, 0),
            sunset: at(19, 0),
        }
    }

    #[test]
    fn test_default_governor_boundaries() {
        let offsets = SunOffsets::default();
        let cases = [
            (at(6, 59), Theme::Dark),
            (at(7, 0), Theme::Light),
            (at(18, 59), Theme::Light),
            (at(19, 0), Theme::Dark),
        ];
        for (now, expected) in cases {
            assert_eq!(
                resolve(now, Governor::Default, &sun(), offsets, false, Theme::Unknown),
                expected,
                "at {now}"
            );
        }
    }

    #[test]
    fn test_offsets_shift_boundaries() {
        let offsets = SunOffsets::new(30, -60);
        let sun = sun();
        let resolve_at =
            |now| resolve(now, Governor::Default, &sun, offsets, false, Theme::Unknown);

        assert_eq!(resolve_at(at(7, 29)), Theme::Dark);
        assert_eq!(resolve_at(at(7, 30)), Theme::Light);
        assert_eq!(resolve_at(at(17, 59)), Theme::Light);
        assert_eq!(resolve_at(at(18, 0)), Theme::Dark);
    }

    #[test]
    fn test_inverted_offsets_swap_window() {
        // light_start 13:00, dark_start 12:00
        let offsets = SunOffsets::new(360, -420);
        let sun = sun();
        let resolve_at =
            |now| resolve(now, Governor::Default, &sun, offsets, false, Theme::Unknown);

        assert_eq!(resolve_at(at(11, 59)), Theme::Dark);
        assert_eq!(resolve_at(at(12, 0)), Theme::Light);
        assert_eq!(resolve_at(at(12, 59)), Theme::Light);
        assert_eq!(resolve_at(at(13, 0)), Theme::Dark);
    }

    #[test]
    fn test_equal_boundaries_are_always_dark() {
        let offsets = SunOffsets::new(360, -360);
        let sun = sun();
        for hour in 0..24 {
            assert_eq!(
                resolve(at(hour, 0), Governor::Default, &sun, offsets, false, Theme::Unknown),
                Theme::Dark
            );
        }
    }

    #[test]
    fn test_night_light_ignores_sun_times() {
        let offsets = SunOffsets::default();
        assert_eq!(
            resolve(at(12, 0), Governor::NightLight, &sun(), offsets, true, Theme::Unknown),
            Theme::Dark
        );
        assert_eq!(
            resolve(at(23, 0), Governor::NightLight, &sun(), offsets, false, Theme::Unknown),
            Theme::Light
        );
    }

    #[test]
    fn test_forced_theme_wins() {
        let offsets = SunOffsets::default();
        assert_eq!(
            resolve(at(12, 0), Governor::Default, &sun(), offsets, false, Theme::Dark),
            Theme::Dark
        );
        assert_eq!(
            resolve(at(12, 0), Governor::NightLight, &sun(), offsets, true, Theme::Light),
            Theme::Light
        );
    }
}
