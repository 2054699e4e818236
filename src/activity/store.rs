//! Snapshot lifecycle: the open snapshot plus a bounded history of closed ones
//!
//! All mutation goes through one mutex, held only for the in-memory work of a
//! single apply or rotate. Snapshots are shared as `Arc<Snapshot>`: readers
//! clone the pointer and walk away, and the writer copies on write if a
//! reader still holds the open snapshot. Closed snapshots are never written
//! again.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;

use crate::activity::delta::ActivityDelta;
use crate::activity::snapshot::{Snapshot, SystemRef};
use crate::core::types::{Tick, TickTime};

/// Capacity of the change notification channel. Slow subscribers lag
/// rather than block writers.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("rotation to {attempted} does not advance past current tick {current}")]
    InvalidRotation { current: TickTime, attempted: TickTime },
}

/// Change notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Applied { system: String, faction: String },
    Rotated { closed: Tick, opened: Tick },
    /// The untagged start-up snapshot was tagged with the first known tick
    Adopted { tick: Tick },
    Restored,
}

#[derive(Debug)]
struct StoreInner {
    current: Arc<Snapshot>,
    /// Most recent first
    history: VecDeque<Arc<Snapshot>>,
}

#[derive(Debug)]
pub struct ActivityStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
    retention: usize,
}

impl ActivityStore {
    /// A store whose open snapshot starts at `tick`
    pub fn new(tick: &Tick, retention: usize) -> Self {
        Self::with_state(Snapshot::open(tick), Vec::new(), retention)
    }

    /// A store resumed from saved state. `history` is most recent first and
    /// is truncated to `retention`.
    pub fn with_state(current: Snapshot, history: Vec<Snapshot>, retention: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let retention = retention.max(1);
        let history = history.into_iter().take(retention).map(Arc::new).collect();
        Self {
            inner: Mutex::new(StoreInner {
                current: Arc::new(current),
                history,
            }),
            events,
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Every critical section leaves the snapshot valid, so a panicked
        // holder does not invalidate the data
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// The open snapshot as of now
    pub fn current(&self) -> Arc<Snapshot> {
        self.lock().current.clone()
    }

    pub fn current_tick(&self) -> Tick {
        self.lock().current.tick()
    }

    /// Accumulate a delta into the open snapshot, creating the system and
    /// faction entries on first use
    ///
    /// No deduplication happens here: callers deliver each event once.
    pub fn apply(&self, system: impl Into<SystemRef>, faction: &str, delta: &ActivityDelta) {
        let system = system.into();
        let mut inner = self.lock();
        Arc::make_mut(&mut inner.current).apply(&system, faction, delta);
        self.notify(StoreEvent::Applied {
            system: system.name,
            faction: faction.to_string(),
        });
    }

    /// Close the open snapshot into history and open an empty one at `tick`
    ///
    /// Returns `false` without touching anything when `tick` does not
    /// strictly advance past the open snapshot's tick time.
    pub fn rotate(&self, tick: &Tick) -> bool {
        match self.try_rotate(tick) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%err, "rotation ignored");
                false
            }
        }
    }

    pub fn try_rotate(&self, tick: &Tick) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let current_time = inner.current.tick_time;
        if tick.time <= current_time {
            return Err(StoreError::InvalidRotation {
                current: current_time,
                attempted: tick.time,
            });
        }

        let closed = std::mem::replace(&mut inner.current, Arc::new(Snapshot::open(tick)));
        let closed_tick = closed.tick();
        inner.history.push_front(closed);
        while inner.history.len() > self.retention {
            inner.history.pop_back();
        }

        tracing::info!(
            closed = %closed_tick.time,
            opened = %tick.time,
            history = inner.history.len(),
            "tick rotated"
        );
        self.notify(StoreEvent::Rotated {
            closed: closed_tick,
            opened: tick.clone(),
        });
        Ok(())
    }

    /// Tag the start-up snapshot with the first real tick instead of rotating
    ///
    /// Applies only while the open snapshot has no tick id and no activity,
    /// so nothing is ever lost. Returns whether the snapshot was tagged.
    pub fn adopt_first_tick(&self, tick: &Tick) -> bool {
        let mut inner = self.lock();
        if !inner.current.tick_id.is_empty() || !inner.current.is_empty() {
            return false;
        }
        if tick.time <= inner.current.tick_time {
            return false;
        }
        inner.current = Arc::new(Snapshot::open(tick));
        tracing::info!(tick = %tick.time, "first tick adopted");
        self.notify(StoreEvent::Adopted { tick: tick.clone() });
        true
    }

    /// Closed snapshots, most recent first, at most `limit` of them
    pub fn history(&self, limit: usize) -> History {
        let inner = self.lock();
        History {
            entries: inner.history.iter().take(limit).cloned().collect(),
        }
    }

    /// Consistent copy of the open snapshot and the whole history
    pub fn export(&self) -> (Arc<Snapshot>, History) {
        let inner = self.lock();
        (
            inner.current.clone(),
            History {
                entries: inner.history.iter().cloned().collect(),
            },
        )
    }

    /// Replace all state with saved state
    pub fn restore(&self, current: Snapshot, history: Vec<Snapshot>) {
        let mut inner = self.lock();
        inner.current = Arc::new(current);
        inner.history = history.into_iter().take(self.retention).map(Arc::new).collect();
        self.notify(StoreEvent::Restored);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Read-only view of closed snapshots, most recent first
///
/// Holds its own references, so it can be iterated any number of times and
/// outlives later rotations.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Arc<Snapshot>>,
}

impl History {
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> + '_ {
        self.entries.iter().map(|s| &**s)
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.entries.get(index).map(|s| &**s)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Snapshot> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Snapshot;
    type IntoIter =
        std::iter::Map<std::slice::Iter<'a, Arc<Snapshot>>, fn(&'a Arc<Snapshot>) -> &'a Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        let deref: fn(&'a Arc<Snapshot>) -> &'a Snapshot = |s| &**s;
        self.entries.iter().map(deref)
    }
}
