// ── Observer-counted query cache ──
//
// Concurrent keyed storage where each entry is a `watch` channel. The
// receiver count of that channel is the entry's observer count, and writes
// that depend on it happen while the entry's shard lock is held, so an
// observer cannot appear or vanish between the check and the write.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::trace;

use super::data::{FetchStatus, QueryData, QueryState};
use super::key::QueryKey;
use super::observer::QueryObserver;

const INVALIDATION_CHANNEL_SIZE: usize = 256;

struct Entry {
    state: watch::Sender<QueryState>,
    /// Last write or subscription; drives GC of unobserved entries.
    touched: Instant,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            touched: Instant::now(),
        }
    }

    fn observers(&self) -> usize {
        self.state.receiver_count()
    }

    fn write(&mut self, data: QueryData) {
        let now = Instant::now();
        self.touched = now;
        self.state.send_modify(|s| {
            s.data = Some(Arc::new(data));
            s.updated_at = Some(now);
            s.stale = false;
            s.fetch_status = FetchStatus::Idle;
            s.error = None;
        });
    }
}

/// Keyed, observer-counted cache of query results.
///
/// Callbacks passed to the `update_*` methods run under an entry lock and
/// must not call back into the cache.
pub struct QueryCache {
    entries: DashMap<QueryKey, Entry>,
    invalidated: broadcast::Sender<QueryKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidated, _) = broadcast::channel(INVALIDATION_CHANNEL_SIZE);
        Self {
            entries: DashMap::new(),
            invalidated,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current data for `key`, if loaded.
    pub fn get(&self, key: &QueryKey) -> Option<Arc<QueryData>> {
        self.entries
            .get(key)
            .and_then(|e| e.state.borrow().data.clone())
    }

    /// Full state for `key`, if the entry exists.
    pub fn state(&self, key: &QueryKey) -> Option<QueryState> {
        self.entries.get(key).map(|e| e.state.borrow().clone())
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.entries.get(key).map_or(0, |e| e.observers())
    }

    /// Loaded, not invalidated, and written within `stale_time`.
    pub fn is_fresh(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.entries.get(key).is_some_and(|e| {
            let state = e.state.borrow();
            state.data.is_some()
                && !state.stale
                && state
                    .updated_at
                    .is_some_and(|at| at.elapsed() < stale_time)
        })
    }

    /// Keys at or below `prefix`.
    pub fn keys_with_prefix(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Register an observer for `key`, creating an empty entry if needed.
    pub fn observe(&self, key: QueryKey) -> QueryObserver {
        let mut entry = self.entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.touched = Instant::now();
        QueryObserver::new(key, entry.state.subscribe())
    }

    /// Receiver of keys that were invalidated while observed.
    pub fn invalidations(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidated.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Store `data` under `key` regardless of observers.
    pub fn set(&self, key: QueryKey, data: QueryData) {
        trace!(%key, "cache set");
        self.entries
            .entry(key)
            .or_insert_with(Entry::new)
            .write(data);
    }

    /// Apply `f` to the entry only if it has at least one observer.
    ///
    /// `f` receives the current data (`None` while still loading) and
    /// returns the replacement, or `None` to leave the entry unchanged.
    /// Returns whether a write happened.
    pub fn update_if_observed<F>(&self, key: &QueryKey, f: F) -> bool
    where
        F: FnOnce(Option<&QueryData>) -> Option<QueryData>,
    {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.observers() == 0 {
            return false;
        }
        let current = entry.state.borrow().data.clone();
        match f(current.as_deref()) {
            Some(next) => {
                entry.write(next);
                true
            }
            None => false,
        }
    }

    /// Replace the loaded data of `key` with `f(current)`, observed or not.
    ///
    /// Runs under the entry lock, so writes that landed while the caller
    /// was awaiting are part of `current`. Missing or unloaded entries are
    /// left alone; `f` returning `None` means no change. Returns whether a
    /// write happened.
    pub fn update<F>(&self, key: &QueryKey, f: F) -> bool
    where
        F: FnOnce(&QueryData) -> Option<QueryData>,
    {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(current) = entry.state.borrow().data.clone() else {
            return false;
        };
        match f(&current) {
            Some(next) => {
                entry.write(next);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every observed, loaded entry at or below `prefix`.
    ///
    /// Returns the number of entries written.
    pub fn update_observed_with_prefix<F>(&self, prefix: &QueryKey, mut f: F) -> usize
    where
        F: FnMut(&QueryKey, &QueryData) -> Option<QueryData>,
    {
        let mut written = 0;
        for mut entry in self.entries.iter_mut() {
            if !entry.key().starts_with(prefix) || entry.observers() == 0 {
                continue;
            }
            let Some(current) = entry.state.borrow().data.clone() else {
                continue;
            };
            if let Some(next) = f(entry.key(), &current) {
                entry.write(next);
                written += 1;
            }
        }
        written
    }

    /// Mark every entry at or below `prefix` stale and notify its
    /// observers. Observed keys are announced on
    /// [`invalidations`](Self::invalidations) so a refetcher can act;
    /// unobserved entries refetch on their next read.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut announced = Vec::new();
        let mut marked = 0;

        for entry in self.entries.iter() {
            if !entry.key().starts_with(prefix) {
                continue;
            }
            entry.state.send_modify(|s| s.stale = true);
            marked += 1;
            if entry.observers() > 0 {
                announced.push(entry.key().clone());
            }
        }

        trace!(%prefix, marked, observed = announced.len(), "invalidated");
        for key in announced {
            // No listener simply means nobody refetches eagerly.
            let _ = self.invalidated.send(key);
        }
        marked
    }

    /// Record that a fetch for `key` started.
    pub fn mark_fetching(&self, key: &QueryKey) {
        self.entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .state
            .send_modify(|s| s.fetch_status = FetchStatus::Fetching);
    }

    /// Record that a fetch finished without writing data.
    pub fn mark_idle(&self, key: &QueryKey) {
        if let Some(entry) = self.entries.get(key) {
            entry.state.send_if_modified(|s| {
                let was = std::mem::replace(&mut s.fetch_status, FetchStatus::Idle);
                was != FetchStatus::Idle
            });
        }
    }

    /// Record a failed fetch; existing data is kept.
    pub fn mark_error(&self, key: &QueryKey, message: String) {
        self.entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .state
            .send_modify(|s| {
                s.fetch_status = FetchStatus::Idle;
                s.error = Some(message);
            });
    }

    /// Run `fetch` for `key`, recording fetching and error state around it.
    ///
    /// On success the result is stored with [`set`](Self::set); on failure
    /// existing data is kept and the error message lands in the entry.
    pub async fn fetch_with<Fut, E>(&self, key: &QueryKey, fetch: Fut) -> Result<(), E>
    where
        Fut: Future<Output = Result<QueryData, E>>,
        E: std::fmt::Display,
    {
        self.mark_fetching(key);
        match fetch.await {
            Ok(data) => {
                self.set(key.clone(), data);
                Ok(())
            }
            Err(e) => {
                self.mark_error(key, e.to_string());
                Err(e)
            }
        }
    }

    /// Drop unobserved entries untouched for at least `cache_time`.
    pub fn gc(&self, cache_time: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.observers() > 0 || e.touched.elapsed() < cache_time);
        before - self.entries.len()
    }
}
