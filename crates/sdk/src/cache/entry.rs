use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::SlotTracker;
use crate::{
    error::DataError,
    types::{Slot, SlotInstant},
};

/// Value produced by a loader, with the slot it is consistent with.
#[derive(Debug)]
pub struct Fetched<V> {
    pub value: V,
    pub slot: Slot,
}

impl<V> Fetched<V> {
    pub fn new(value: V, slot: Slot) -> Self { Self { value, slot } }
}

/// Published value of a cache entry. Immutable and cheap to clone.
pub struct Snapshot<V> {
    value: Arc<V>,
    instant: SlotInstant,
}

impl<V> Snapshot<V> {
    pub(crate) fn new(value: V, slot: Slot, refreshed_at: DateTime<Utc>) -> Self {
        Self { value: Arc::new(value), instant: SlotInstant::new(slot, refreshed_at) }
    }

    pub fn value(&self) -> &V { &self.value }

    pub fn shared(&self) -> Arc<V> { Arc::clone(&self.value) }

    pub fn slot(&self) -> Slot { self.instant.slot() }

    pub fn refreshed_at(&self) -> DateTime<Utc> { self.instant.observed_at() }

    pub fn instant(&self) -> SlotInstant { self.instant }
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self { Self { value: Arc::clone(&self.value), instant: self.instant } }
}

impl<V> std::ops::Deref for Snapshot<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target { &self.value }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("slot", &self.slot())
            .field("refreshed_at", &self.refreshed_at())
            .field("value", &self.value)
            .finish()
    }
}

/// Lifecycle of a cache entry.
///
/// ```text
/// Empty --refresh--> Loading(None) --ok--> Ready
///                                  --err-> Empty
/// Ready --refresh--> Loading(Some(prev)) --ok--> Ready(new)
///                                        --err-> Ready(prev)
/// ```
pub enum EntryState<V> {
    Empty,
    Loading(Option<Snapshot<V>>),
    Ready(Snapshot<V>),
}

impl<V> Default for EntryState<V> {
    fn default() -> Self { EntryState::Empty }
}

/// What happened to an entry when a refresh completed.
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed { slot: Slot },
    Retained(DataError),
}

impl<V> EntryState<V> {
    /// Last successfully loaded value, also while a refresh is in progress.
    pub fn last_good(&self) -> Option<&Snapshot<V>> {
        match self {
            EntryState::Empty => None,
            EntryState::Loading(previous) => previous.as_ref(),
            EntryState::Ready(snapshot) => Some(snapshot),
        }
    }

    pub fn is_loading(&self) -> bool { matches!(self, EntryState::Loading(_)) }

    /// Marks a refresh as started, keeping the previous value servable.
    pub fn begin(self) -> Self {
        match self {
            EntryState::Empty => EntryState::Loading(None),
            EntryState::Ready(snapshot) => EntryState::Loading(Some(snapshot)),
            loading @ EntryState::Loading(_) => loading,
        }
    }

    /// Applies a completed load.
    ///
    /// A success at or above the slot floor publishes the new value and
    /// advances the floor. Anything else, including a success below the
    /// floor, restores the previous value and leaves the floor untouched.
    pub fn settle(
        self,
        tracker: SlotTracker,
        outcome: Result<Fetched<V>, DataError>,
        now: DateTime<Utc>,
    ) -> (Self, SlotTracker, RefreshOutcome) {
        let previous = match self {
            EntryState::Empty => None,
            EntryState::Loading(previous) => previous,
            EntryState::Ready(snapshot) => Some(snapshot),
        };
        let restore = |previous: Option<Snapshot<V>>| match previous {
            Some(snapshot) => EntryState::Ready(snapshot),
            None => EntryState::Empty,
        };

        match outcome {
            Ok(fetched) => {
                let mut tracker = tracker;
                if tracker.observe(fetched.slot) {
                    (
                        EntryState::Ready(Snapshot::new(fetched.value, fetched.slot, now)),
                        tracker,
                        RefreshOutcome::Refreshed { slot: fetched.slot },
                    )
                } else {
                    let err = DataError::SlotRegression { floor: tracker.floor(), observed: fetched.slot };
                    (restore(previous), tracker, RefreshOutcome::Retained(err))
                }
            },
            Err(err) => (restore(previous), tracker, RefreshOutcome::Retained(err)),
        }
    }
}
