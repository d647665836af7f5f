//! Carry user postpones across a restart.
//!
//! At shutdown the user's own delay and skip items are written to
//! `$XDG_STATE_HOME/duskswitch/postpone.json` together with the theme that was
//! on screen. At startup they are restored if they still make sense and the
//! file is emptied so a crash loop cannot resurrect them twice.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{DELAY_AUTO_SWITCH, PAUSE_AUTO_SWITCH, PostponeItem, PostponeStore, SkipType};
use crate::common::constants::{
    POSTPONE_FILE_NAME, RESTORE_EXPIRY_MARGIN_SECS, RESTORE_MAX_AGE_HOURS,
};
use crate::common::utils::{private_path, state_dir};
use crate::theme::Theme;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostponeSnapshot {
    pub last_modified: DateTime<Local>,
    pub theme_at_exit: Theme,
    pub items: Vec<PostponeItem>,
}

/// Result of restoring a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub theme_at_exit: Theme,
    pub items: Vec<String>,
}

pub fn default_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(POSTPONE_FILE_NAME))
}

/// Persist user delay/skip items. With nothing to keep, any old file is removed.
///
/// Returns the number of items written.
pub fn save(path: &Path, store: &PostponeStore, theme_at_exit: Theme) -> Result<usize> {
    let items: Vec<PostponeItem> = store
        .items()
        .into_iter()
        .filter(|item| item.user_clearable)
        .filter(|item| item.name == DELAY_AUTO_SWITCH || item.name == PAUSE_AUTO_SWITCH)
        .collect();

    if items.is_empty() {
        clear(path)?;
        return Ok(0);
    }

    let snapshot = PostponeSnapshot {
        last_modified: Local::now(),
        theme_at_exit,
        items,
    };
    write_atomic(path, &snapshot)?;

    log_decorated!(
        "Postpones preserved for next start: [{}]",
        snapshot
            .items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(snapshot.items.len())
}

fn write_atomic(path: &Path, snapshot: &PostponeSnapshot) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid postpone path: {}", private_path(path)))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create state directory {}", private_path(dir)))?;

    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize postpones")?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .context("Failed to create temporary postpone file")?;
    temp.write_all(json.as_bytes())
        .context("Failed to write temporary postpone file")?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", private_path(path)))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Option<PostponeSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", private_path(path)))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", private_path(path)))?;
    Ok(Some(snapshot))
}

pub fn clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", private_path(path))),
    }
}

/// Whether a persisted item is still meaningful at `now`.
///
/// `night_light_active` is the current night-light signal when that governor
/// is in use.
fn should_restore(
    item: &PostponeItem,
    snapshot: &PostponeSnapshot,
    now: DateTime<Local>,
    night_light_active: Option<bool>,
) -> bool {
    if let Some(expiry) = item.expiry {
        return expiry > now + Duration::seconds(RESTORE_EXPIRY_MARGIN_SECS);
    }

    if item.skip_type == SkipType::Unspecified {
        return false;
    }

    if snapshot.last_modified < now - Duration::hours(RESTORE_MAX_AGE_HOURS) {
        return false;
    }

    // Night light flipped while the service was down: the skipped switch
    // already happened
    match (item.skip_type, night_light_active, snapshot.theme_at_exit) {
        (SkipType::UntilSunset, Some(false), Theme::Light) => false,
        (SkipType::UntilSunrise, Some(true), Theme::Dark) => false,
        _ => true,
    }
}

/// Add every still-valid item of `snapshot` to `store`.
pub fn restore(
    store: &PostponeStore,
    snapshot: &PostponeSnapshot,
    now: DateTime<Local>,
    night_light_active: Option<bool>,
) -> Restored {
    let mut restored = Vec::new();
    for item in &snapshot.items {
        if should_restore(item, snapshot, now, night_light_active) {
            store.add(item.clone());
            restored.push(item.name.clone());
        }
    }
    Restored {
        theme_at_exit: snapshot.theme_at_exit,
        items: restored,
    }
}

/// Load, restore and clear in one go. Errors are logged and swallowed.
pub fn restore_from_disk(
    path: &Path,
    store: &PostponeStore,
    now: DateTime<Local>,
    night_light_active: Option<bool>,
) -> Option<Restored> {
    let snapshot = match load(path) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return None,
        Err(e) => {
            log_warning!("Could not load saved postpones: {e:#}");
            let _ = clear(path);
            return None;
        }
    };

    let restored = restore(store, &snapshot, now, night_light_active);
    if !restored.items.is_empty() {
        log_decorated!("Restored postpones: [{}]", restored.items.join(", "));
    }

    if let Err(e) = clear(path) {
        log_warning!("Could not clear saved postpones: {e:#}");
    }
    Some(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::Log;
    use crate::postpone::{SESSION_LOCK, SkipTarget};
    use crate::time::ManualTimeSource;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 4, day, hour, minute, 0).unwrap()
    }

    fn store_at(now: DateTime<Local>) -> PostponeStore {
        Log::set_enabled(false);
        PostponeStore::new(Arc::new(ManualTimeSource::new(now)))
    }

    fn snapshot(last_modified: DateTime<Local>, items: Vec<PostponeItem>) -> PostponeSnapshot {
        PostponeSnapshot {
            last_modified,
            theme_at_exit: Theme::Light,
            items,
        }
    }

    #[test]
    fn test_save_keeps_only_user_delays_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("postpone.json");
        let store = store_at(at(1, 12, 0));
        store.add(PostponeItem::session_lock());
        store.add(PostponeItem::delay(at(1, 12, 0), 90).unwrap());
        store.add_skip_next(SkipTarget::for_night_light(Theme::Light));

        assert_eq!(save(&path, &store, Theme::Dark).unwrap(), 2);

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.theme_at_exit, Theme::Dark);
        let names: Vec<_> = loaded.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![DELAY_AUTO_SWITCH, PAUSE_AUTO_SWITCH]);
        assert!(!names.contains(&SESSION_LOCK));
    }

    #[test]
    fn test_save_without_user_items_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postpone.json");
        std::fs::write(&path, "{}").unwrap();

        let store = store_at(at(1, 12, 0));
        assert_eq!(save(&path, &store, Theme::Light).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_restore_requires_expiry_margin() {
        let now = at(1, 12, 0);
        let store = store_at(now);
        let snap = snapshot(
            at(1, 11, 0),
            vec![
                PostponeItem::new(DELAY_AUTO_SWITCH)
                    .with_expiry(now + Duration::seconds(3))
                    .user_clearable(),
                PostponeItem::new(PAUSE_AUTO_SWITCH)
                    .with_expiry(now + Duration::hours(2))
                    .with_skip_type(SkipType::UntilSunset)
                    .user_clearable(),
            ],
        );

        let restored = restore(&store, &snap, now, None);
        assert_eq!(restored.items, vec![PAUSE_AUTO_SWITCH.to_string()]);
        assert!(store.is_skip_next_switch());
        assert!(store.get(DELAY_AUTO_SWITCH).is_none());
    }

    #[test]
    fn test_restore_drops_stale_skip_without_expiry() {
        let now = at(3, 12, 0);
        let skip = PostponeItem::new(PAUSE_AUTO_SWITCH)
            .with_skip_type(SkipType::UntilSunrise)
            .user_clearable();

        let store = store_at(now);
        let old = snapshot(at(2, 11, 0), vec![skip.clone()]);
        assert!(restore(&store, &old, now, None).items.is_empty());

        let fresh = snapshot(at(3, 11, 0), vec![skip]);
        assert_eq!(restore(&store, &fresh, now, None).items.len(), 1);
    }

    #[test]
    fn test_restore_drops_skip_already_satisfied_by_night_light() {
        let now = at(1, 12, 0);
        let store = store_at(now);
        let skip = PostponeItem::new(PAUSE_AUTO_SWITCH)
            .with_skip_type(SkipType::UntilSunset)
            .user_clearable();
        let snap = snapshot(at(1, 11, 0), vec![skip]);

        assert!(restore(&store, &snap, now, Some(false)).items.is_empty());
        assert_eq!(restore(&store, &snap, now, Some(true)).items.len(), 1);
    }

    #[test]
    fn test_restore_from_disk_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postpone.json");
        let now = at(1, 12, 0);

        let store = store_at(now);
        store.add(PostponeItem::delay(now, 60).unwrap());
        save(&path, &store, Theme::Dark).unwrap();

        let fresh = store_at(now);
        let restored = restore_from_disk(&path, &fresh, now, None).unwrap();
        assert_eq!(restored.theme_at_exit, Theme::Dark);
        assert!(fresh.is_user_delayed());
        assert!(!path.exists());
    }

    #[test]
    fn test_restore_from_corrupt_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postpone.json");
        std::fs::write(&path, "not json").unwrap();

        let store = store_at(at(1, 12, 0));
        assert!(restore_from_disk(&path, &store, at(1, 12, 0), None).is_none());
        assert!(!store.is_postponed());
    }
}
