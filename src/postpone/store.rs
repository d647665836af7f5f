//! The postpone store.
//!
//! A single mutex guards the name → item map. Expired items are pruned lazily:
//! every query evaluates expiries against the injected clock and drops what has
//! passed before answering, so nothing depends on a background sweeper. Logging
//! and queue-cleared callbacks always run after the map lock is released.

use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{
    DELAY_AUTO_SWITCH, PAUSE_AUTO_SWITCH, PostponeItem, PostponeQueueDto, SESSION_LOCK,
    SWITCH_NOTIFICATION, SkipType,
};
use crate::common::subscription::Subscription;
use crate::common::utils::lock;
use crate::geo::{BoundaryKind, Schedule};
use crate::theme::Theme;
use crate::time::SharedClock;

type QueueClearedCallback = Arc<dyn Fn() + Send + Sync>;
type CallbackList = Mutex<Vec<(u64, QueueClearedCallback)>>;

/// Expiry and classification for a skip-next item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipTarget {
    pub expiry: Option<DateTime<Local>>,
    pub skip_type: SkipType,
}

impl SkipTarget {
    /// Skip target under the Default governor.
    ///
    /// The skip lasts until the schedule agrees with `current_theme` again. When
    /// the theme on screen already matches the schedule, the upcoming boundary
    /// is the switch being skipped and the skip runs to the boundary after it.
    /// An unknown `current_theme` always targets the next boundary.
    pub fn for_schedule(
        now: DateTime<Local>,
        schedule: &Schedule,
        current_theme: Theme,
    ) -> Result<Self> {
        let scheduled = schedule.scheduled_theme(now)?;
        let skip_index = usize::from(current_theme.is_known() && current_theme == scheduled);

        let boundaries = schedule.boundaries_after(now, 2)?;
        let boundary = boundaries
            .get(skip_index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("No upcoming boundary to skip to"))?;

        Ok(Self {
            expiry: Some(boundary.at),
            skip_type: match boundary.kind {
                BoundaryKind::LightStart => SkipType::UntilSunrise,
                BoundaryKind::DarkStart => SkipType::UntilSunset,
            },
        })
    }

    /// Skip target under the NightLight governor: no expiry, the night-light
    /// adapter consumes the item.
    pub fn for_night_light(requested: Theme) -> Self {
        Self {
            expiry: None,
            skip_type: if requested == Theme::Light {
                SkipType::UntilSunrise
            } else {
                SkipType::UntilSunset
            },
        }
    }

    fn into_item(self) -> PostponeItem {
        let mut item = PostponeItem::new(PAUSE_AUTO_SWITCH)
            .with_skip_type(self.skip_type)
            .user_clearable();
        item.expiry = self.expiry;
        item
    }
}

/// Thread-safe collection of postpone items keyed by name.
pub struct PostponeStore {
    clock: SharedClock,
    items: Mutex<BTreeMap<String, PostponeItem>>,
    callbacks: Arc<CallbackList>,
    next_callback_id: AtomicU64,
}

impl PostponeStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            items: Mutex::new(BTreeMap::new()),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            next_callback_id: AtomicU64::new(0),
        }
    }

    /// Run `f` against the map, optionally pruning expired items first.
    ///
    /// Expiry logging and queue-cleared callbacks happen after the lock is
    /// released, and only when this call took the store from non-empty to empty.
    fn with_items<R>(
        &self,
        prune: bool,
        f: impl FnOnce(&mut BTreeMap<String, PostponeItem>) -> R,
    ) -> R {
        self.with_items_pruned(prune, f).0
    }

    /// Like `with_items`, also returning how many items the prune dropped.
    fn with_items_pruned<R>(
        &self,
        prune: bool,
        f: impl FnOnce(&mut BTreeMap<String, PostponeItem>) -> R,
    ) -> (R, usize) {
        let now = self.clock.now();
        let (result, expired, emptied) = {
            let mut items = lock(&self.items);
            let was_populated = !items.is_empty();

            let mut expired = Vec::new();
            if prune {
                items.retain(|name, item| {
                    let keep = !item.is_expired(now);
                    if !keep {
                        expired.push(name.clone());
                    }
                    keep
                });
            }

            let result = f(&mut items);
            (result, expired, was_populated && items.is_empty())
        };

        for name in &expired {
            log_decorated!("Postpone '{}' expired", name);
        }
        if emptied {
            self.notify_queue_cleared();
        }
        (result, expired.len())
    }

    fn notify_queue_cleared(&self) {
        let callbacks: Vec<QueueClearedCallback> = lock(&self.callbacks)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Register a callback fired whenever the store goes from populated to empty.
    pub fn on_queue_cleared(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.callbacks).push((id, Arc::new(callback)));

        let callbacks: Weak<CallbackList> = Arc::downgrade(&self.callbacks);
        Subscription::new(move || {
            if let Some(callbacks) = callbacks.upgrade() {
                lock(&callbacks).retain(|(registered, _)| *registered != id);
            }
        })
    }

    // # Core operations

    /// Insert or replace by name. Returns `true` if the name was not present.
    pub fn add(&self, item: PostponeItem) -> bool {
        let name = item.name.clone();
        let expiry = item.expiry;
        let added = self.with_items(false, |items| items.insert(item.name.clone(), item).is_none());

        match (added, expiry) {
            (true, Some(expiry)) => {
                log_decorated!("Postponed by '{}' until {}", name, expiry.format("%H:%M:%S"))
            }
            (true, None) => log_decorated!("Postponed by '{}'", name),
            (false, Some(expiry)) => {
                log_decorated!("Postpone '{}' now ends {}", name, expiry.format("%H:%M:%S"))
            }
            (false, None) => {}
        }
        added
    }

    /// Remove by name. Missing names are a no-op.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.with_items(false, |items| items.remove(name).is_some());
        if removed {
            log_decorated!("Postpone '{}' removed", name);
        }
        removed
    }

    /// The item if present and unexpired.
    pub fn get(&self, name: &str) -> Option<PostponeItem> {
        self.with_items(true, |items| items.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Unexpired items, ordered by name.
    pub fn items(&self) -> Vec<PostponeItem> {
        self.with_items(true, |items| items.values().cloned().collect())
    }

    pub fn count(&self) -> usize {
        self.with_items(true, |items| items.len())
    }

    pub fn count_user_clearable(&self) -> usize {
        self.with_items(true, |items| {
            items.values().filter(|item| item.user_clearable).count()
        })
    }

    // # Predicates

    /// Any unexpired item at all.
    pub fn is_postponed(&self) -> bool {
        self.count() > 0
    }

    pub fn is_skip_next_switch(&self) -> bool {
        self.contains(PAUSE_AUTO_SWITCH)
    }

    /// Any unexpired user-clearable item.
    pub fn is_user_delayed(&self) -> bool {
        self.count_user_clearable() > 0
    }

    pub fn is_grace_period(&self) -> bool {
        self.contains(SWITCH_NOTIFICATION)
    }

    pub fn is_session_locked(&self) -> bool {
        self.contains(SESSION_LOCK)
    }

    // # Bulk operations

    /// Remove every user-clearable item. Returns how many were removed.
    pub fn remove_user_clearable(&self) -> usize {
        let removed = self.with_items(true, |items| {
            let before = items.len();
            items.retain(|_, item| !item.user_clearable);
            before - items.len()
        });
        if removed > 0 {
            log_decorated!("Cleared {} user postpone(s)", removed);
        }
        removed
    }

    /// Re-check every expiry against the current wall clock and drop what has
    /// passed. Called after a clock discontinuity so nothing outlives its window
    /// waiting for the next lazy lookup. Returns how many items were dropped.
    pub fn sync_expiry_times_with_system_clock(&self) -> usize {
        let ((), dropped) = self.with_items_pruned(true, |_| ());
        if dropped > 0 {
            log_decorated!("Clock resync dropped {} stale postpone(s)", dropped);
        }
        dropped
    }

    pub fn clear(&self) {
        self.with_items(false, |items| items.clear());
    }

    // # Skip next switch

    /// Skip the next sunrise-or-sunset crossing strictly after now.
    pub fn add_skip_next_switch(&self, schedule: &Schedule) -> Result<()> {
        let target = SkipTarget::for_schedule(self.clock.now(), schedule, Theme::Unknown)?;
        self.add_skip_next(target);
        Ok(())
    }

    pub fn add_skip_next(&self, target: SkipTarget) -> bool {
        self.add(target.into_item())
    }

    pub fn remove_skip_next(&self) -> bool {
        self.remove(PAUSE_AUTO_SWITCH)
    }

    /// Clear an active skip or delay, or start a skip when neither is active.
    ///
    /// Returns `true` when a skip was added.
    pub fn toggle_skip_next(&self, target: SkipTarget) -> bool {
        let active = self.with_items(true, |items| {
            items.contains_key(PAUSE_AUTO_SWITCH) || items.contains_key(DELAY_AUTO_SWITCH)
        });

        if active {
            self.remove_skip_next();
            false
        } else {
            self.add_skip_next(target);
            true
        }
    }

    /// Recompute an existing skip after sun times or the governor changed.
    /// Does nothing when no skip is active.
    pub fn update_skip_next_expiry(&self, target: SkipTarget) -> bool {
        let updated = self.with_items(true, |items| match items.get_mut(PAUSE_AUTO_SWITCH) {
            Some(item) if item.expiry != target.expiry || item.skip_type != target.skip_type => {
                item.expiry = target.expiry;
                item.skip_type = target.skip_type;
                true
            }
            _ => false,
        });
        if updated {
            match target.expiry {
                Some(expiry) => log_decorated!("Skip now ends {}", expiry.format("%a %H:%M")),
                None => log_decorated!("Skip now waits for the next night light change"),
            }
        }
        updated
    }

    // # Snapshots

    pub fn snapshot_dto(&self) -> PostponeQueueDto {
        let now = self.clock.now();
        PostponeQueueDto::from_items(&self.items(), now)
    }

    /// Soonest expiry among the current items, if any item expires.
    pub fn next_expiry(&self) -> Option<DateTime<Local>> {
        self.with_items(true, |items| items.values().filter_map(|item| item.expiry).min())
    }

    /// Time until the soonest expiry, clamped at zero.
    pub fn time_until_next_expiry(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.next_expiry()
            .map(|expiry| (expiry - now).max(Duration::zero()))
    }
}

impl std::fmt::Debug for PostponeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostponeStore")
            .field("items", &*lock(&self.items))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::Log;
    use crate::geo::{ManualSunTimes, SunOffsets};
    use crate::time::ManualTimeSource;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 4, day, hour, minute, 0).unwrap()
    }

    fn store_at(now: DateTime<Local>) -> (Arc<ManualTimeSource>, PostponeStore) {
        Log::set_enabled(false);
        let clock = Arc::new(ManualTimeSource::new(now));
        let store = PostponeStore::new(clock.clone());
        (clock, store)
    }

    fn schedule() -> Schedule {
        let manual = ManualSunTimes::parse("07:00:00", "19:00:00").unwrap();
        Schedule::new(Arc::new(manual), SunOffsets::default())
    }

    #[test]
    fn test_add_replaces_by_name() {
        let (_, store) = store_at(at(1, 12, 0));
        assert!(store.add(PostponeItem::new("x").with_expiry(at(1, 13, 0))));
        assert!(!store.add(PostponeItem::new("x").with_expiry(at(1, 14, 0))));
        assert_eq!(store.count(), 1);
        assert_eq!(store.get("x").unwrap().expiry, Some(at(1, 14, 0)));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let (_, store) = store_at(at(1, 12, 0));
        assert!(!store.remove("nothing"));
        store.add(PostponeItem::new("x"));
        assert!(store.remove("x"));
        assert!(!store.remove("x"));
    }

    #[test]
    fn test_get_prunes_expired() {
        let (clock, store) = store_at(at(1, 12, 0));
        store.add(PostponeItem::new("x").with_expiry(at(1, 12, 30)).user_clearable());
        assert!(store.is_user_delayed());

        clock.advance(std::time::Duration::from_secs(31 * 60));
        assert!(store.get("x").is_none());
        assert!(!store.is_user_delayed());
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_permanent_items_never_expire() {
        let (clock, store) = store_at(at(1, 12, 0));
        store.add(PostponeItem::session_lock());
        clock.jump_wall(Duration::days(30));
        assert!(store.is_session_locked());
        assert!(!store.is_user_delayed());
    }

    #[test]
    fn test_remove_user_clearable_keeps_system_items() {
        let (_, store) = store_at(at(1, 12, 0));
        store.add(PostponeItem::session_lock());
        store.add(PostponeItem::delay(at(1, 12, 0), 10).unwrap());
        store.add_skip_next(SkipTarget::for_night_light(Theme::Light));

        assert_eq!(store.remove_user_clearable(), 2);
        assert_eq!(store.count(), 1);
        assert!(store.is_session_locked());
    }

    #[test]
    fn test_sync_drops_items_passed_during_sleep() {
        let (clock, store) = store_at(at(1, 12, 0));
        store.add(PostponeItem::delay(at(1, 12, 0), 30).unwrap());
        store.add(PostponeItem::new("later").with_expiry(at(2, 12, 0)));

        clock.jump_wall(Duration::hours(3));
        assert_eq!(store.sync_expiry_times_with_system_clock(), 1);
        assert_eq!(store.count(), 1);
        assert!(store.contains("later"));
    }

    #[test]
    fn test_sync_reports_only_items_it_pruned() {
        let (clock, store) = store_at(at(1, 12, 0));
        store.add(PostponeItem::session_lock());
        store.add(PostponeItem::new("a").with_expiry(at(1, 12, 10)));
        store.add(PostponeItem::new("b").with_expiry(at(1, 12, 20)));
        store.add(PostponeItem::new("later").with_expiry(at(2, 12, 0)));

        clock.jump_wall(Duration::hours(1));
        assert_eq!(store.sync_expiry_times_with_system_clock(), 2);
        // Nothing left to drop
        assert_eq!(store.sync_expiry_times_with_system_clock(), 0);

        store.add(PostponeItem::new("c").with_expiry(at(1, 13, 30)));
        clock.jump_wall(Duration::hours(1));
        assert_eq!(store.sync_expiry_times_with_system_clock(), 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_queue_cleared_fires_once_outside_lock() {
        let (clock, store) = store_at(at(1, 12, 0));
        let store = Arc::new(store);
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = fired.clone();
        let store_clone = store.clone();
        let subscription = store.on_queue_cleared(move || {
            // Re-entering the store from the callback must not deadlock
            assert_eq!(store_clone.count(), 0);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.add(PostponeItem::new("a").with_expiry(at(1, 12, 5)));
        store.add(PostponeItem::new("b"));
        store.remove("b");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        clock.advance(std::time::Duration::from_secs(600));
        assert!(!store.is_postponed());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Querying an already empty store does not fire again
        assert!(!store.is_postponed());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        store.add(PostponeItem::new("c"));
        store.remove("c");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skip_next_targets_next_boundary_for_unknown_theme() {
        let (_, store) = store_at(at(1, 12, 0));
        store.add_skip_next_switch(&schedule()).unwrap();

        let item = store.get(PAUSE_AUTO_SWITCH).unwrap();
        assert_eq!(item.expiry, Some(at(1, 19, 0)));
        assert_eq!(item.skip_type, SkipType::UntilSunset);
        assert!(item.user_clearable);
    }

    #[test]
    fn test_skip_target_when_theme_matches_schedule() {
        let target = SkipTarget::for_schedule(at(1, 12, 0), &schedule(), Theme::Light).unwrap();
        assert_eq!(target.expiry, Some(at(2, 7, 0)));
        assert_eq!(target.skip_type, SkipType::UntilSunrise);
    }

    #[test]
    fn test_skip_target_when_theme_differs_from_schedule() {
        let target = SkipTarget::for_schedule(at(1, 12, 0), &schedule(), Theme::Dark).unwrap();
        assert_eq!(target.expiry, Some(at(1, 19, 0)));
        assert_eq!(target.skip_type, SkipType::UntilSunset);

        let night = SkipTarget::for_schedule(at(1, 23, 0), &schedule(), Theme::Light).unwrap();
        assert_eq!(night.expiry, Some(at(2, 7, 0)));
        assert_eq!(night.skip_type, SkipType::UntilSunrise);
    }

    #[test]
    fn test_toggle_skip_next() {
        let (_, store) = store_at(at(1, 12, 0));
        let target = SkipTarget::for_night_light(Theme::Dark);

        assert!(store.toggle_skip_next(target));
        assert!(store.is_skip_next_switch());
        assert!(!store.toggle_skip_next(target));
        assert!(!store.is_skip_next_switch());

        // An active delay counts as an active skip: toggling only clears
        store.add(PostponeItem::delay(at(1, 12, 0), 15).unwrap());
        assert!(!store.toggle_skip_next(target));
        assert!(!store.is_skip_next_switch());
        assert!(store.is_user_delayed());
    }

    #[test]
    fn test_update_skip_next_expiry() {
        let (_, store) = store_at(at(1, 12, 0));
        let target = SkipTarget::for_schedule(at(1, 12, 0), &schedule(), Theme::Dark).unwrap();
        assert!(!store.update_skip_next_expiry(target));

        store.add_skip_next(target);
        assert!(!store.update_skip_next_expiry(target));

        let night_light = SkipTarget::for_night_light(Theme::Light);
        assert!(store.update_skip_next_expiry(night_light));
        let item = store.get(PAUSE_AUTO_SWITCH).unwrap();
        assert_eq!(item.expiry, None);
        assert_eq!(item.skip_type, SkipType::UntilSunrise);
    }

    #[test]
    fn test_next_expiry() {
        let (_, store) = store_at(at(1, 12, 0));
        assert_eq!(store.next_expiry(), None);
        store.add(PostponeItem::session_lock());
        store.add(PostponeItem::new("a").with_expiry(at(1, 15, 0)));
        store.add(PostponeItem::new("b").with_expiry(at(1, 13, 0)));
        assert_eq!(store.next_expiry(), Some(at(1, 13, 0)));
        assert_eq!(store.time_until_next_expiry(), Some(Duration::hours(1)));
    }
}
