//! Serializable view of the postpone queue.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{PAUSE_AUTO_SWITCH, PostponeItem, SkipType};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostponeQueueDto {
    pub items: Vec<PostponeItemDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostponeItemDto {
    pub reason: String,
    pub translated_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Local>>,
    pub expires: bool,
    pub skip_type: SkipType,
    pub is_user_clearable: bool,
}

impl PostponeQueueDto {
    pub fn from_items(items: &[PostponeItem], now: DateTime<Local>) -> Self {
        Self {
            items: items
                .iter()
                .map(|item| PostponeItemDto::from_item(item, now))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PostponeItemDto {
    pub fn from_item(item: &PostponeItem, now: DateTime<Local>) -> Self {
        Self {
            reason: item.name.clone(),
            translated_reason: describe(item, now),
            expiry: item.expiry,
            expires: item.expires(),
            skip_type: item.skip_type,
            is_user_clearable: item.user_clearable,
        }
    }
}

/// "PauseAutoSwitch" → "Pause Auto Switch".
fn split_words(reason: &str) -> String {
    let mut words = String::with_capacity(reason.len() + 4);
    for (i, ch) in reason.chars().enumerate() {
        if i > 0 && ch.is_uppercase() {
            words.push(' ');
        }
        words.push(ch);
    }
    words
}

fn describe(item: &PostponeItem, now: DateTime<Local>) -> String {
    let reason = split_words(&item.name);

    match item.expiry {
        Some(expiry) if expiry.date_naive() != now.date_naive() => {
            format!("{reason} until {}", expiry.format("%A %H:%M"))
        }
        Some(expiry) => format!("{reason} until {}", expiry.format("%H:%M")),
        None if item.name == PAUSE_AUTO_SWITCH => match item.skip_type {
            SkipType::UntilSunrise => format!("{reason} until next sunrise"),
            SkipType::UntilSunset => format!("{reason} until next sunset"),
            SkipType::Unspecified => format!("{reason} until next switch"),
        },
        None => format!("{reason} until condition is met"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postpone::SESSION_LOCK;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("PauseAutoSwitch"), "Pause Auto Switch");
        assert_eq!(split_words("x"), "x");
    }

    #[test]
    fn test_translated_reasons() {
        let today = PostponeItem::new("DelayAutoSwitch")
            .with_expiry(Local.with_ymd_and_hms(2025, 4, 1, 12, 45, 0).unwrap());
        assert_eq!(describe(&today, now()), "Delay Auto Switch until 12:45");

        let tomorrow = PostponeItem::new("DelayAutoSwitch")
            .with_expiry(Local.with_ymd_and_hms(2025, 4, 2, 7, 0, 0).unwrap());
        assert_eq!(
            describe(&tomorrow, now()),
            "Delay Auto Switch until Wednesday 07:00"
        );

        let skip = PostponeItem::new(PAUSE_AUTO_SWITCH).with_skip_type(SkipType::UntilSunset);
        assert_eq!(describe(&skip, now()), "Pause Auto Switch until next sunset");

        let lock = PostponeItem::new(SESSION_LOCK);
        assert_eq!(describe(&lock, now()), "Session Lock until condition is met");
    }

    #[test]
    fn test_dto_json_shape() {
        let dto = PostponeQueueDto::from_items(&[PostponeItem::session_lock()], now());
        let json: serde_json::Value = serde_json::to_value(&dto).unwrap();
        let item = &json["items"][0];
        assert_eq!(item["reason"], "SessionLock");
        assert_eq!(item["expires"], false);
        assert_eq!(item["skip_type"], "unspecified");
        assert!(item.get("expiry").is_none());
    }
}
