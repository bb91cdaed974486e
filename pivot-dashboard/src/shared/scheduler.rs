//! Timers for the single-owner event loop.
//!
//! A [`Scheduler`] never runs callbacks itself. When a timer fires, the loop
//! receives its `(TimerHandle, Timer)` pair and hands it to the dashboard,
//! which ignores any handle that is no longer the current one for its kind.

use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use std::{collections::BTreeMap, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};

/// Kinds of timer the dashboard schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timer {
    /// Next push stream connection attempt
    Reconnect,
    /// Debounced fetch of auxiliary data for visible rows
    LevelFetch,
    /// Periodic pivot status poll
    StatusPoll,
    /// Periodic repaint of relative timestamps
    RelativeTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub timer: Timer,
}

pub trait Scheduler {
    /// Current wall clock time as seen by this scheduler.
    fn now(&self) -> DateTime<Utc>;

    /// Fire `timer` once after `delay`.
    fn after(&mut self, delay: Duration, timer: Timer) -> TimerHandle;

    /// Best-effort cancellation. A fire already queued may still be delivered.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Virtual time scheduler. Time only moves through [`ManualScheduler::advance`].
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    now: DateTime<Utc>,
    next_id: u64,
    // (deadline, handle) orders equal deadlines by scheduling order
    queue: BTreeMap<(DateTime<Utc>, TimerHandle), Timer>,
}

impl ManualScheduler {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: start,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to its deadline.
    pub fn next_due(&mut self, until: DateTime<Utc>) -> Option<Fired> {
        let (&(deadline, handle), _) = self.queue.first_key_value()?;
        if deadline > until {
            return None;
        }

        let timer = self.queue.remove(&(deadline, handle))?;
        self.now = self.now.max(deadline);
        Some(Fired { handle, timer })
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = self.now.max(now);
    }

    /// Advance by `by`, returning every fire in deadline order.
    ///
    /// Timers scheduled while handling the returned fires are not included;
    /// use [`ManualScheduler::next_due`] in a loop for that.
    pub fn advance(&mut self, by: Duration) -> Vec<Fired> {
        let until = self.now + delta(by);
        let fired = std::iter::from_fn(|| self.next_due(until)).collect();
        self.now = until;
        fired
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deadlines of pending timers of one kind, soonest first.
    pub fn deadlines(&self, timer: Timer) -> Vec<DateTime<Utc>> {
        self.queue
            .iter()
            .filter(|(_, kind)| **kind == timer)
            .map(|((deadline, _), _)| *deadline)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn after(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.queue.insert((self.now + delta(delay), handle), timer);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.retain(|(_, queued), _| *queued != handle);
    }
}

/// Scheduler backed by tokio sleeps. Fires are delivered on the receiver
/// returned by [`TokioScheduler::new`].
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: u64,
    fired_tx: mpsc::UnboundedSender<Fired>,
    tasks: FnvHashMap<TimerHandle, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_id: 0,
                fired_tx,
                tasks: FnvHashMap::default(),
            },
            fired_rx,
        )
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);

        // Drop bookkeeping of timers that already ran
        self.tasks.retain(|_, task| !task.is_finished());

        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(Fired { handle, timer });
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

pub(crate) fn delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
