//! Sunrise/sunset boundaries for the Default governor.
//!
//! ## Module Structure
//!
//! - [`solar`]: coordinates → sunrise/sunset through the `sunrise` crate
//! - [`schedule`]: offset boundaries, "what is scheduled now" and "what comes next"
//!
//! Sun times are always expressed in the local timezone of the host, since that
//! is the clock the user reads and the one postpone expiries are compared with.

pub mod schedule;
pub mod solar;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};

pub use schedule::{Boundary, BoundaryKind, Schedule};
pub use solar::SolarSunTimes;

/// Sunrise and sunset for one local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Local>,
    pub sunset: DateTime<Local>,
}

/// Signed minute offsets applied to sunrise and sunset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SunOffsets {
    pub sunrise_minutes: i64,
    pub sunset_minutes: i64,
}

impl SunOffsets {
    pub fn new(sunrise_minutes: i64, sunset_minutes: i64) -> Self {
        Self {
            sunrise_minutes,
            sunset_minutes,
        }
    }

    /// Instant the light theme is due.
    pub fn light_start(&self, sun: &SunTimes) -> DateTime<Local> {
        sun.sunrise + Duration::minutes(self.sunrise_minutes)
    }

    /// Instant the dark theme is due.
    pub fn dark_start(&self, sun: &SunTimes) -> DateTime<Local> {
        sun.sunset + Duration::minutes(self.sunset_minutes)
    }
}

/// Provider of sunrise/sunset for a local date.
pub trait SunTimeSource: Send + Sync {
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// User-entered fixed sunrise and sunset times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualSunTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

impl ManualSunTimes {
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        Self { sunrise, sunset }
    }

    /// Parse `HH:MM:SS` (or `HH:MM`) strings.
    pub fn parse(sunrise: &str, sunset: &str) -> Result<Self> {
        Ok(Self {
            sunrise: parse_time(sunrise)
                .with_context(|| format!("Invalid sunrise time '{sunrise}'"))?,
            sunset: parse_time(sunset).with_context(|| format!("Invalid sunset time '{sunset}'"))?,
        })
    }
}

impl SunTimeSource for ManualSunTimes {
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes> {
        Ok(SunTimes {
            sunrise: local_datetime(date, self.sunrise)?,
            sunset: local_datetime(date, self.sunset)?,
        })
    }

    fn describe(&self) -> String {
        format!(
            "manual (sunrise {}, sunset {})",
            self.sunrise.format("%H:%M:%S"),
            self.sunset.format("%H:%M:%S")
        )
    }
}

pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M"))
        .map_err(|e| anyhow::anyhow!("expected HH:MM:SS ({e})"))
}

/// Anchor a wall-clock time on a local date.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times that
/// fall into a DST gap move forward by the gap.
pub fn local_datetime(date: NaiveDate, time: NaiveTime) -> Result<DateTime<Local>> {
    let naive = date.and_time(time);
    if let Some(dt) = Local.from_local_datetime(&naive).earliest() {
        return Ok(dt);
    }
    Local
        .from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("{naive} does not exist in the local timezone"))
}
