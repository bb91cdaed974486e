//! Visibility tracking and the debounced fetch queue it drives.
//!
//! Rows report which symbols are on screen. Symbols that enter without fresh
//! cached data become pending; symbols that leave stop being pending. A single
//! debounce timer, restarted on every pending addition, releases the queue.

use super::scheduler::{Scheduler, Timer, TimerHandle};
use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;
use std::time::Duration;
use tracing::debug;

/// Default quiet period before pending keys are fetched.
pub const DEFAULT_FETCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Keys that entered and left the visible set in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityChange {
    pub entered: Vec<String>,
    pub left: Vec<String>,
}

impl VisibilityChange {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Capability reporting which keys are visible.
pub trait VisibilityObserver {
    /// Replace the visible rows with `keys` (one per row, repeats allowed).
    fn observe(&mut self, keys: &[String]) -> VisibilityChange;

    fn is_visible(&self, key: &str) -> bool;
}

/// [`VisibilityObserver`] diffing consecutive materialized windows.
///
/// Several rows may show the same key; it stays visible while any of them does.
#[derive(Debug, Clone, Default)]
pub struct WindowVisibility {
    rows: FnvHashMap<String, usize>,
}

impl WindowVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}

impl VisibilityObserver for WindowVisibility {
    fn observe(&mut self, keys: &[String]) -> VisibilityChange {
        let mut rows: FnvHashMap<String, usize> = FnvHashMap::default();
        let mut entered = Vec::new();
        for key in keys {
            let count = rows.entry(key.clone()).or_default();
            if *count == 0 && !self.rows.contains_key(key) {
                entered.push(key.clone());
            }
            *count += 1;
        }

        let mut left = self
            .rows
            .keys()
            .filter(|key| !rows.contains_key(*key))
            .cloned()
            .collect::<Vec<_>>();
        left.sort();

        self.rows = rows;
        VisibilityChange { entered, left }
    }

    fn is_visible(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }
}

#[derive(Debug, Clone)]
pub struct FetchScheduler {
    debounce: Duration,
    pending: IndexSet<String>,
    in_flight: FnvHashSet<String>,
    timer: Option<TimerHandle>,
}

impl FetchScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: IndexSet::new(),
            in_flight: FnvHashSet::default(),
            timer: None,
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    /// Apply a visibility change. `is_fresh` reports keys with usable cached data.
    pub fn on_visibility<S: Scheduler>(
        &mut self,
        change: &VisibilityChange,
        is_fresh: impl Fn(&str) -> bool,
        scheduler: &mut S,
    ) {
        for key in &change.left {
            self.pending.shift_remove(key);
        }

        let mut added = false;
        for key in &change.entered {
            if is_fresh(key) || self.in_flight.contains(key) {
                continue;
            }
            added |= self.pending.insert(key.clone());
        }

        if added {
            if let Some(previous) = self.timer.take() {
                scheduler.cancel(previous);
            }
            self.timer = Some(scheduler.after(self.debounce, Timer::LevelFetch));
        }
    }

    /// Handle a debounce fire, returning the keys to fetch now.
    ///
    /// Each key is re-checked: it must still be visible and still lack fresh data.
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        is_visible: impl Fn(&str) -> bool,
        is_fresh: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        if self.timer != Some(handle) {
            debug!(?handle, "Ignoring superseded fetch timer");
            return Vec::new();
        }
        self.timer = None;

        let due = self
            .pending
            .drain(..)
            .filter(|key| is_visible(key) && !is_fresh(key))
            .collect::<Vec<_>>();

        self.in_flight.extend(due.iter().cloned());
        due
    }

    /// Fetch `key` now, bypassing the debounce and the visibility check.
    /// Returns `false` if a fetch for it is already in flight.
    pub fn begin(&mut self, key: &str) -> bool {
        self.pending.shift_remove(key);
        self.in_flight.insert(key.to_string())
    }

    /// A fetch for `key` finished, successfully or not.
    pub fn on_complete(&mut self, key: &str) {
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::scheduler::ManualScheduler;
    use chrono::{TimeZone, Utc};

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_window_visibility_diff() {
        let mut visibility = WindowVisibility::new();

        let change = visibility.observe(&keys(&["A", "B", "A"]));
        assert_eq!(change.entered, keys(&["A", "B"]));
        assert!(change.left.is_empty());

        let change = visibility.observe(&keys(&["B", "C"]));
        assert_eq!(change.entered, keys(&["C"]));
        assert_eq!(change.left, keys(&["A"]));

        assert!(visibility.observe(&keys(&["C", "B"])).is_empty());
        assert!(visibility.is_visible("B"));
        assert!(!visibility.is_visible("A"));
    }

    #[test]
    fn test_debounce_restarts_and_rechecks_visibility() {
        let mut scheduler = ManualScheduler::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let mut visibility = WindowVisibility::new();
        let mut fetches = FetchScheduler::new(DEFAULT_FETCH_DEBOUNCE);
        let fresh = |key: &str| key == "FRESH";

        let change = visibility.observe(&keys(&["A", "FRESH"]));
        fetches.on_visibility(&change, fresh, &mut scheduler);
        assert_eq!(fetches.pending().collect::<Vec<_>>(), vec!["A"]);
        let first = fetches.timer().unwrap();

        scheduler.advance(Duration::from_millis(200));
        let change = visibility.observe(&keys(&["A", "B", "C"]));
        fetches.on_visibility(&change, fresh, &mut scheduler);
        let second = fetches.timer().unwrap();
        assert_ne!(first, second);

        // First timer was cancelled, nothing fires at its original deadline
        assert!(scheduler.advance(Duration::from_millis(100)).is_empty());

        // C scrolls away before the fire
        let change = visibility.observe(&keys(&["A", "B"]));
        fetches.on_visibility(&change, fresh, &mut scheduler);
        assert!(!fetches.is_pending("C"));

        let fired = scheduler.advance(Duration::from_millis(200));
        assert_eq!(fired.len(), 1);
        let due = fetches.on_timer(fired[0].handle, |key| visibility.is_visible(key), fresh);
        assert_eq!(due, keys(&["A", "B"]));
        assert!(fetches.is_in_flight("A"));
        assert_eq!(fetches.pending().count(), 0);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut scheduler = ManualScheduler::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let mut fetches = FetchScheduler::new(DEFAULT_FETCH_DEBOUNCE);

        let change = VisibilityChange {
            entered: keys(&["A"]),
            left: Vec::new(),
        };
        fetches.on_visibility(&change, |_| false, &mut scheduler);
        let current = fetches.timer().unwrap();

        let stale = scheduler.after(Duration::from_millis(1), Timer::LevelFetch);
        assert!(fetches.on_timer(stale, |_| true, |_| false).is_empty());
        assert!(fetches.is_pending("A"));

        assert_eq!(fetches.on_timer(current, |_| true, |_| false), keys(&["A"]));
    }

    #[test]
    fn test_in_flight_keys_are_not_requeued() {
        let mut scheduler = ManualScheduler::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let mut fetches = FetchScheduler::new(DEFAULT_FETCH_DEBOUNCE);
        let entered = VisibilityChange {
            entered: keys(&["A"]),
            left: Vec::new(),
        };

        fetches.on_visibility(&entered, |_| false, &mut scheduler);
        let handle = fetches.timer().unwrap();
        assert_eq!(fetches.on_timer(handle, |_| true, |_| false), keys(&["A"]));

        fetches.on_visibility(&entered, |_| false, &mut scheduler);
        assert!(!fetches.is_pending("A"));

        fetches.on_complete("A");
        fetches.on_visibility(&entered, |_| false, &mut scheduler);
        assert!(fetches.is_pending("A"));
    }

    #[test]
    fn test_begin_takes_key_out_of_queue() {
        let mut scheduler = ManualScheduler::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let mut fetches = FetchScheduler::new(DEFAULT_FETCH_DEBOUNCE);
        let entered = VisibilityChange {
            entered: keys(&["A", "B"]),
            left: Vec::new(),
        };
        fetches.on_visibility(&entered, |_| false, &mut scheduler);

        assert!(fetches.begin("A"));
        assert!(!fetches.is_pending("A"));
        assert!(fetches.is_in_flight("A"));
        assert!(!fetches.begin("A"));

        let handle = fetches.timer().unwrap();
        assert_eq!(fetches.on_timer(handle, |_| true, |_| false), keys(&["B"]));

        fetches.on_complete("A");
        assert!(fetches.begin("A"));
    }
}
