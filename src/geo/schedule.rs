//! Offset boundaries and the theme they schedule.

use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use std::sync::Arc;

use super::{SunOffsets, SunTimeSource, SunTimes};
use crate::theme::{Governor, Theme, resolve};

/// Which of the two daily boundaries an instant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Sunrise plus its offset.
    LightStart,
    /// Sunset plus its offset.
    DarkStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub at: DateTime<Local>,
    pub kind: BoundaryKind,
}

/// Sun-time source plus the user's offsets.
#[derive(Clone)]
pub struct Schedule {
    source: Arc<dyn SunTimeSource>,
    offsets: SunOffsets,
}

impl Schedule {
    pub fn new(source: Arc<dyn SunTimeSource>, offsets: SunOffsets) -> Self {
        Self { source, offsets }
    }

    pub fn offsets(&self) -> SunOffsets {
        self.offsets
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Sun times for the local date of `now`.
    pub fn today(&self, now: DateTime<Local>) -> Result<SunTimes> {
        self.source.sun_times(now.date_naive())
    }

    /// Theme the Default governor wants at `now`, ignoring every override.
    pub fn scheduled_theme(&self, now: DateTime<Local>) -> Result<Theme> {
        let sun = self.today(now)?;
        Ok(resolve(
            now,
            Governor::Default,
            &sun,
            self.offsets,
            false,
            Theme::Unknown,
        ))
    }

    /// The first `count` boundaries strictly after `now`, in order.
    pub fn boundaries_after(&self, now: DateTime<Local>, count: usize) -> Result<Vec<Boundary>> {
        let today = now.date_naive();
        let mut boundaries = Vec::with_capacity(8);

        for day in -1..=3 {
            let sun = self.source.sun_times(today + Duration::days(day))?;
            boundaries.push(Boundary {
                at: self.offsets.light_start(&sun),
                kind: BoundaryKind::LightStart,
            });
            boundaries.push(Boundary {
                at: self.offsets.dark_start(&sun),
                kind: BoundaryKind::DarkStart,
            });
        }

        boundaries.retain(|b| b.at > now);
        boundaries.sort_by_key(|b| b.at);
        boundaries.truncate(count);
        Ok(boundaries)
    }

    /// The next boundary strictly after `now`.
    pub fn next_boundary(&self, now: DateTime<Local>) -> Result<Boundary> {
        self.boundaries_after(now, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No upcoming sunrise or sunset after {now}"))
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("source", &self.source.describe())
            .field("offsets", &self.offsets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ManualSunTimes;
    use chrono::TimeZone;

    fn schedule(offsets: SunOffsets) -> Schedule {
        let manual = ManualSunTimes::parse("07:00:00", "19:00:00").unwrap();
        Schedule::new(Arc::new(manual), offsets)
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_next_boundary_during_day() {
        let next = schedule(SunOffsets::default())
            .next_boundary(at(10, 12, 0))
            .unwrap();
        assert_eq!(next.at, at(10, 19, 0));
        assert_eq!(next.kind, BoundaryKind::DarkStart);
    }

    #[test]
    fn test_next_boundary_rolls_to_tomorrow() {
        let next = schedule(SunOffsets::default())
            .next_boundary(at(10, 22, 0))
            .unwrap();
        assert_eq!(next.at, at(11, 7, 0));
        assert_eq!(next.kind, BoundaryKind::LightStart);
    }

    #[test]
    fn test_boundary_at_now_is_not_next() {
        let next = schedule(SunOffsets::default())
            .next_boundary(at(10, 7, 0))
            .unwrap();
        assert_eq!(next.at, at(10, 19, 0));
    }

    #[test]
    fn test_boundaries_after_are_ordered() {
        let boundaries = schedule(SunOffsets::new(-30, 30))
            .boundaries_after(at(10, 12, 0), 3)
            .unwrap();
        let times: Vec<_> = boundaries.iter().map(|b| b.at).collect();
        assert_eq!(times, vec![at(10, 19, 30), at(11, 6, 30), at(11, 19, 30)]);
    }

    #[test]
    fn test_scheduled_theme() {
        let schedule = schedule(SunOffsets::default());
        assert_eq!(schedule.scheduled_theme(at(10, 6, 59)).unwrap(), Theme::Dark);
        assert_eq!(schedule.scheduled_theme(at(10, 7, 0)).unwrap(), Theme::Light);
        assert_eq!(schedule.scheduled_theme(at(10, 19, 0)).unwrap(), Theme::Dark);
    }
}
