//! Named suspensions of automatic theme switching.
//!
//! ## Module Structure
//!
//! - [`store`]: the thread-safe, lazily pruned collection of postpone items
//! - [`dto`]: the snapshot shape exposed over the command interface
//! - [`persist`]: carrying user postpones across a restart

pub mod dto;
pub mod persist;
pub mod store;

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

pub use dto::{PostponeItemDto, PostponeQueueDto};
pub use store::{PostponeStore, SkipTarget};

/// Skip the next scheduled switch.
pub const PAUSE_AUTO_SWITCH: &str = "PauseAutoSwitch";
/// Delay automatic switching by a fixed number of minutes.
pub const DELAY_AUTO_SWITCH: &str = "DelayAutoSwitch";
/// Grace period while the user decides on a switch prompt.
pub const SWITCH_NOTIFICATION: &str = "SwitchNotification";
/// The session is locked.
pub const SESSION_LOCK: &str = "SessionLock";

/// Which boundary a skip-next item waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipType {
    UntilSunrise,
    UntilSunset,
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostponeItem {
    pub name: String,
    /// `None` means the item lives until removed.
    pub expiry: Option<DateTime<Local>>,
    #[serde(default)]
    pub skip_type: SkipType,
    #[serde(default)]
    pub user_clearable: bool,
}

impl PostponeItem {
    /// A permanent, non-clearable item.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiry: None,
            skip_type: SkipType::Unspecified,
            user_clearable: false,
        }
    }

    pub fn with_expiry(mut self, expiry: DateTime<Local>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_skip_type(mut self, skip_type: SkipType) -> Self {
        self.skip_type = skip_type;
        self
    }

    pub fn user_clearable(mut self) -> Self {
        self.user_clearable = true;
        self
    }

    /// `DelayBy`: user-clearable, expires `minutes` after `now`.
    ///
    /// `None` when the expiry cannot be represented.
    pub fn delay(now: DateTime<Local>, minutes: i64) -> Option<Self> {
        let expiry = now.checked_add_signed(Duration::try_minutes(minutes)?)?;
        Some(
            Self::new(DELAY_AUTO_SWITCH)
                .with_expiry(expiry)
                .user_clearable(),
        )
    }

    pub fn session_lock() -> Self {
        Self::new(SESSION_LOCK)
    }

    pub fn expires(&self) -> bool {
        self.expiry.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}
