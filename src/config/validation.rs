//! Configuration validation.
//!
//! Rejects values the engine cannot work with. Runs before defaults are
//! applied, so every check treats a missing field as valid.

use anyhow::{Context, Result};
use std::ops::RangeInclusive;

use super::Config;
use crate::common::constants::*;
use crate::geo::parse_time;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(ref sunrise) = config.sunrise {
        parse_time(sunrise)
            .with_context(|| format!("Invalid sunrise time '{sunrise}'. Use HH:MM:SS format"))?;
    }
    if let Some(ref sunset) = config.sunset {
        parse_time(sunset)
            .with_context(|| format!("Invalid sunset time '{sunset}'. Use HH:MM:SS format"))?;
    }

    let offsets = MINIMUM_SUN_OFFSET_MINUTES..=MAXIMUM_SUN_OFFSET_MINUTES;
    check_range("sunrise_offset", config.sunrise_offset, &offsets, "minutes")?;
    check_range("sunset_offset", config.sunset_offset, &offsets, "minutes")?;

    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    check_range(
        "notify_grace_minutes",
        config.notify_grace_minutes,
        &(MINIMUM_NOTIFY_GRACE_MINUTES..=MAXIMUM_NOTIFY_GRACE_MINUTES),
        "minutes",
    )?;
    check_range(
        "refresh_timeout_ms",
        config.refresh_timeout_ms,
        &(MINIMUM_REFRESH_TIMEOUT_MS..=MAXIMUM_REFRESH_TIMEOUT_MS),
        "milliseconds",
    )?;
    check_range(
        "time_change_debounce_ms",
        config.time_change_debounce_ms,
        &(0..=MAXIMUM_TIME_CHANGE_DEBOUNCE_MS),
        "milliseconds",
    )?;
    check_range(
        "check_interval",
        config.check_interval,
        &(MINIMUM_CHECK_INTERVAL..=MAXIMUM_CHECK_INTERVAL),
        "seconds",
    )?;
    check_range(
        "ipc_timeout_ms",
        config.ipc_timeout_ms,
        &(MINIMUM_IPC_TIMEOUT_MS..=MAXIMUM_IPC_TIMEOUT_MS),
        "milliseconds",
    )?;

    for (name, command) in [
        ("light_command", &config.light_command),
        ("dark_command", &config.dark_command),
    ] {
        if let Some(command) = command
            && command.trim().is_empty()
        {
            anyhow::bail!("{} must not be empty", name);
        }
    }

    Ok(())
}

fn check_range<T>(name: &str, value: Option<T>, range: &RangeInclusive<T>, unit: &str) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if let Some(value) = value
        && !range.contains(&value)
    {
        anyhow::bail!(
            "{} ({} {}) must be between {} and {} {}",
            name,
            value,
            unit,
            range.start(),
            range.end(),
            unit
        );
    }
    Ok(())
}
