//! Application-wide constants and default values.

use crate::theme::Governor;

// # Application Metadata

pub const APP_NAME: &str = "duskswitch";
pub const CONFIG_FILE_NAME: &str = "duskswitch.toml";
pub const SOCKET_FILE_NAME: &str = "duskswitch.sock";
pub const LOCK_FILE_NAME: &str = "duskswitch.lock";
pub const POSTPONE_FILE_NAME: &str = "postpone.json";

// # Default Configuration Values

pub const DEFAULT_GOVERNOR: Governor = Governor::Default;
pub const DEFAULT_AUTO_SWITCH: bool = true;
pub const DEFAULT_SUNRISE: &str = "07:00:00";
pub const DEFAULT_SUNSET: &str = "19:00:00";
pub const DEFAULT_SUN_OFFSET_MINUTES: i64 = 0;
pub const DEFAULT_DARK_ON_BATTERY: bool = false;
pub const DEFAULT_AUTO_SWITCH_NOTIFY: bool = false;
pub const DEFAULT_NOTIFY_GRACE_MINUTES: u64 = 2;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TIME_CHANGE_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_CHECK_INTERVAL: u64 = 60; // seconds
pub const DEFAULT_IPC_TIMEOUT_MS: u64 = 3000;

pub const DEFAULT_LIGHT_COMMAND: &str =
    "gsettings set org.gnome.desktop.interface color-scheme default";
pub const DEFAULT_DARK_COMMAND: &str =
    "gsettings set org.gnome.desktop.interface color-scheme prefer-dark";

// # Validation Limits

pub const MINIMUM_SUN_OFFSET_MINUTES: i64 = -720;
pub const MAXIMUM_SUN_OFFSET_MINUTES: i64 = 720;
pub const MINIMUM_NOTIFY_GRACE_MINUTES: u64 = 1;
pub const MAXIMUM_NOTIFY_GRACE_MINUTES: u64 = 60;
/// Longest `delay_by` a client may request (one week).
pub const MAXIMUM_DELAY_MINUTES: i64 = 7 * 24 * 60;
pub const MINIMUM_REFRESH_TIMEOUT_MS: u64 = 100;
pub const MAXIMUM_REFRESH_TIMEOUT_MS: u64 = 60_000;
pub const MAXIMUM_TIME_CHANGE_DEBOUNCE_MS: u64 = 60_000;
pub const MINIMUM_CHECK_INTERVAL: u64 = 5;
pub const MAXIMUM_CHECK_INTERVAL: u64 = 3600;
pub const MINIMUM_IPC_TIMEOUT_MS: u64 = 100;
pub const MAXIMUM_IPC_TIMEOUT_MS: u64 = 60_000;

// Polar regions have days without a sunrise or sunset
pub const MAXIMUM_LATITUDE: f64 = 65.0;

// # Engine Timing

/// Window after resume during which timerfd wakeups are attributed to sleep.
pub const RESUME_GRACE_SECS: i64 = 5;

/// Restored postpones must outlive startup by at least this much to be kept.
pub const RESTORE_EXPIRY_MARGIN_SECS: i64 = 5;

/// A persisted skip without expiry is dropped once the file is older than this.
pub const RESTORE_MAX_AGE_HOURS: i64 = 24;

/// Refresh delay after a switch on resume or unlock.
pub const REFRESH_SETTLE_DELAY_MS: u64 = 1000;

/// Bounded wait when joining the refresh worker on shutdown.
pub const REFRESH_SHUTDOWN_WAIT_MS: u64 = 2000;

/// Granularity of cancellable sleeps in worker threads.
pub const CANCEL_POLL_MS: u64 = 50;

/// Polling period of property monitors (power, session, night light).
pub const MONITOR_POLL_MS: u64 = 2000;

/// Debounce applied to configuration file events.
pub const CONFIG_DEBOUNCE_MS: u64 = 500;

/// Read timeout used by the command-line client.
pub const CLIENT_READ_TIMEOUT_SECS: u64 = 5;

// # Exit Codes

pub const EXIT_FAILURE: i32 = 1;
