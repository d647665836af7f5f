//! Astronomical sunrise/sunset for configured coordinates.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::{SunTimeSource, SunTimes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarSunTimes {
    latitude: f64,
    longitude: f64,
}

impl SolarSunTimes {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        Coordinates::new(latitude, longitude).ok_or_else(|| {
            anyhow::anyhow!("Invalid coordinates: {latitude:.4}°, {longitude:.4}°")
        })?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    fn event_utc(&self, date: NaiveDate, event: SolarEvent) -> Result<DateTime<Local>> {
        let coord = Coordinates::new(self.latitude, self.longitude)
            .ok_or_else(|| anyhow::anyhow!("Invalid coordinates"))?;
        Ok(SolarDay::new(coord, date)
            .event_time(event)
            .with_timezone(&Local))
    }

    /// The solar day is computed in UTC; far from Greenwich the event can land
    /// on the neighbouring local date, so shift the calculation date once.
    fn event_on(&self, date: NaiveDate, event: SolarEvent) -> Result<DateTime<Local>> {
        let first = self.event_utc(date, event)?;
        let local_date = first.date_naive();
        if local_date < date {
            self.event_utc(date + Duration::days(1), event)
        } else if local_date > date {
            self.event_utc(date - Duration::days(1), event)
        } else {
            Ok(first)
        }
    }
}

impl SunTimeSource for SolarSunTimes {
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes> {
        Ok(SunTimes {
            sunrise: self.event_on(date, SolarEvent::Sunrise)?,
            sunset: self.event_on(date, SolarEvent::Sunset)?,
        })
    }

    fn describe(&self) -> String {
        format!("location ({:.4}°, {:.4}°)", self.latitude, self.longitude)
    }
}
