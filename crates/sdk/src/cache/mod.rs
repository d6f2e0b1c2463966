//! Refreshable per-key snapshot cache.
//!
//! Each key (a venue address) owns one entry holding the last good
//! [`Snapshot`], a [`SlotTracker`] floor and at most one in-flight refresh.
//!
//! * A read of a fresh entry returns the cached snapshot.
//! * A read of a due entry triggers a refresh. Readers that find a refresh
//!   already running get the previous snapshot right away, or join the
//!   running refresh if there is nothing to serve yet.
//! * A failed or slot-regressed refresh keeps the previous snapshot and floor;
//!   it is logged and retried on the next due read or refresher tick.
//!
//! Refresh cadence is measured from the last completed attempt, successful
//! or not.

mod entry;
mod slot;

use std::{fmt::Display, future::Future, hash::Hash, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashMap;
pub use entry::{EntryState, Fetched, RefreshOutcome, Snapshot};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared, join_all},
};
pub use slot::SlotTracker;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::DataError, types::Slot};

/// Fetches and decodes the value of one cache key.
pub trait SnapshotLoader<K, V>: Send + Sync + 'static {
    /// Loads the value for `key`, asking the ledger for state no older than
    /// `min_slot`.
    fn load(&self, key: &K, min_slot: Slot) -> impl Future<Output = Result<Fetched<V>, DataError>> + Send;
}

/// Observable phase of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Loading,
    Ready,
}

type InFlight<V> = Shared<BoxFuture<'static, Option<Snapshot<V>>>>;

struct Entry<V> {
    state: EntryState<V>,
    slots: SlotTracker,
    attempted_at: Option<Instant>,
    in_flight: Option<InFlight<V>>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self { state: EntryState::Empty, slots: SlotTracker::new(), attempted_at: None, in_flight: None }
    }
}

impl<V> Entry<V> {
    fn is_due(&self, now: Instant, interval: Duration) -> bool {
        self.attempted_at.is_none_or(|at| now.saturating_duration_since(at) >= interval)
    }
}

enum Probe<V> {
    Serve(Option<Snapshot<V>>),
    Join(InFlight<V>),
    Refresh,
}

struct Inner<K, V, L> {
    name: &'static str,
    interval: Duration,
    loader: L,
    entries: DashMap<K, Entry<V>>,
}

impl<K, V, L> Inner<K, V, L>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Applies a finished load to the entry and clears its in-flight marker.
    fn complete(&self, key: &K, outcome: Result<Fetched<V>, DataError>) -> Option<Snapshot<V>> {
        let mut guard = self.entries.get_mut(key)?;
        let entry = guard.value_mut();
        let (state, slots, result) =
            std::mem::take(&mut entry.state).settle(entry.slots, outcome, Utc::now());
        match result {
            RefreshOutcome::Refreshed { slot } => {
                debug!(cache = self.name, %key, slot, "refreshed");
            },
            RefreshOutcome::Retained(err) => {
                warn!(
                    cache = self.name,
                    %key,
                    floor = slots.floor(),
                    serving = state.last_good().map(|s| s.slot()),
                    error = %err,
                    "refresh failed, keeping last good snapshot"
                );
            },
        }
        entry.state = state;
        entry.slots = slots;
        entry.attempted_at = Some(Instant::now());
        entry.in_flight = None;
        entry.state.last_good().cloned()
    }
}

/// Cache of immutable snapshots keyed by `K`, refreshed through `L`.
///
/// Cloning is cheap and clones share entries.
pub struct RefreshableCache<K, V, L> {
    inner: Arc<Inner<K, V, L>>,
}

impl<K, V, L> Clone for RefreshableCache<K, V, L> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<K, V, L> RefreshableCache<K, V, L>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Send + Sync + 'static,
    L: SnapshotLoader<K, V>,
{
    pub fn new(name: &'static str, interval: Duration, loader: L) -> Self {
        Self { inner: Arc::new(Inner { name, interval, loader, entries: DashMap::new() }) }
    }

    pub fn name(&self) -> &'static str { self.inner.name }

    pub fn interval(&self) -> Duration { self.inner.interval }

    pub fn loader(&self) -> &L { &self.inner.loader }

    /// Returns the cached snapshot for `key`, refreshing it first when due.
    ///
    /// `None` only when the key has never loaded successfully.
    pub async fn get(&self, key: &K) -> Option<Snapshot<V>> {
        let now = Instant::now();
        let probe = match self.inner.entries.get(key) {
            None => Probe::Refresh,
            Some(entry) => match (&entry.in_flight, entry.state.last_good()) {
                (Some(_), Some(snapshot)) => Probe::Serve(Some(snapshot.clone())),
                (Some(in_flight), None) => Probe::Join(in_flight.clone()),
                (None, _) if entry.is_due(now, self.inner.interval) => Probe::Refresh,
                (None, last_good) => Probe::Serve(last_good.cloned()),
            },
        };
        match probe {
            Probe::Serve(snapshot) => snapshot,
            Probe::Join(in_flight) => in_flight.await,
            Probe::Refresh => self.refresh(key).await,
        }
    }

    /// Returns the cached snapshot without ever triggering a load.
    pub fn peek(&self, key: &K) -> Option<Snapshot<V>> {
        self.inner.entries.get(key).and_then(|e| e.state.last_good().cloned())
    }

    /// Refreshes `key` now, joining the refresh already in flight if any.
    /// Resolves to the last good snapshot after the refresh settles.
    pub async fn refresh(&self, key: &K) -> Option<Snapshot<V>> {
        let in_flight = {
            let mut guard = self.inner.entries.entry(key.clone()).or_default();
            let entry = guard.value_mut();
            match entry.in_flight.clone() {
                Some(in_flight) => in_flight,
                None => {
                    entry.state = std::mem::take(&mut entry.state).begin();
                    let in_flight = self.start(key.clone(), entry.slots.floor());
                    entry.in_flight = Some(in_flight.clone());
                    in_flight
                },
            }
        };
        in_flight.await
    }

    /// Spawns the load so it completes even if every waiter goes away.
    ///
    /// A panicking loader settles the entry as a failed attempt.
    fn start(&self, key: K, min_slot: Slot) -> InFlight<V> {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.loader.load(&key, min_slot))
                .catch_unwind()
                .await
                .unwrap_or(Err(DataError::LoadPanicked));
            inner.complete(&key, outcome)
        });
        async move { task.await.ok().flatten() }.boxed().shared()
    }

    /// Current slot floor of `key`, 0 if never loaded.
    pub fn floor(&self, key: &K) -> Slot { self.inner.entries.get(key).map(|e| e.slots.floor()).unwrap_or(0) }

    pub fn phase(&self, key: &K) -> Phase {
        match self.inner.entries.get(key).as_deref().map(|e| &e.state) {
            None | Some(EntryState::Empty) => Phase::Empty,
            Some(EntryState::Loading(_)) => Phase::Loading,
            Some(EntryState::Ready(_)) => Phase::Ready,
        }
    }

    /// Keys touched so far.
    pub fn keys(&self) -> Vec<K> { self.inner.entries.iter().map(|e| e.key().clone()).collect() }

    pub fn len(&self) -> usize { self.inner.entries.len() }

    pub fn is_empty(&self) -> bool { self.inner.entries.is_empty() }

    /// Spawns a task refreshing every touched key once per interval until
    /// `cancellation_token` is cancelled.
    pub fn spawn_refresher(&self, cancellation_token: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(cache = cache.inner.name, interval = ?cache.inner.interval, "refresher started");
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let keys = cache.keys();
                        join_all(keys.iter().map(|key| cache.refresh(key))).await;
                    },
                }
            }
            info!(cache = cache.inner.name, "refresher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use super::*;

    /// Loader returning an incrementing value, or failing on demand.
    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        slot: AtomicU64,
        fail: std::sync::atomic::AtomicBool,
        panic: std::sync::atomic::AtomicBool,
    }

    impl SnapshotLoader<u8, u64> for Arc<Counter> {
        async fn load(&self, _key: &u8, _min_slot: Slot) -> Result<Fetched<u64>, DataError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.panic.load(Ordering::SeqCst) {
                panic!("loader bug");
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(DataError::Unavailable("down".to_string()));
            }
            Ok(Fetched::new(n, self.slot.load(Ordering::SeqCst)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn serves_fresh_value_without_reload() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshableCache::new("test", Duration::from_secs(1), Arc::clone(&counter));

        assert_eq!(cache.get(&1).await.map(|s| *s), Some(1));
        assert_eq!(cache.get(&1).await.map(|s| *s), Some(1));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&1).await.map(|s| *s), Some(2));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_read_during_refresh() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshableCache::new("test", Duration::from_secs(1), Arc::clone(&counter));
        cache.get(&1).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        let refreshing = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh(&1).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(cache.phase(&1), Phase::Loading);
        // Previous value is served while the refresh runs
        assert_eq!(cache.get(&1).await.map(|s| *s), Some(1));

        assert_eq!(refreshing.await.unwrap().map(|s| *s), Some(2));
        assert_eq!(cache.phase(&1), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_load_is_absent() {
        let counter = Arc::new(Counter::default());
        counter.fail.store(true, Ordering::SeqCst);
        let cache = RefreshableCache::new("test", Duration::from_secs(1), Arc::clone(&counter));

        assert!(cache.get(&1).await.is_none());
        assert_eq!(cache.phase(&1), Phase::Empty);
        // Not due yet: no retry
        assert!(cache.get(&1).await.is_none());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_load_settles_entry() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshableCache::new("test", Duration::from_secs(1), Arc::clone(&counter));
        cache.get(&1).await;

        counter.panic.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.refresh(&1).await.map(|s| *s), Some(1));
        assert_eq!(cache.phase(&1), Phase::Ready);

        // Key keeps refreshing once the loader recovers
        counter.panic.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&1).await.map(|s| *s), Some(3));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_stops_on_cancel() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshableCache::new("test", Duration::from_secs(1), Arc::clone(&counter));
        cache.get(&1).await;

        let token = CancellationToken::new();
        let handle = cache.spawn_refresher(token.clone());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        token.cancel();
        handle.await.unwrap();

        let calls = counter.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "calls = {}", calls);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), calls);
    }
}
