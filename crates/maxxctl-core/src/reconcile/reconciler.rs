// ── Update reconciler ──
//
// Folds push events into observed cache entries. Request updates are
// coalesced per id and flushed on a fixed deadline armed by the first
// unflushed event; attempt and cooldown signals apply immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use maxxctl_api::{ProxyRequest, ProxyUpstreamAttempt, PushEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::in_flight::{InFlightSummary, InFlightTracker};
use super::known::{KnownIds, is_new_request};
use super::merge::{merge_into_infinite, merge_into_page, upsert_attempt};
use crate::cache::{QueryCache, QueryData, QueryKey};

const IN_FLIGHT_PRUNE_INTERVAL: Duration = Duration::from_secs(30);

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay between the first unflushed update and the flush.
    pub flush_interval: Duration,
    /// Maximum age of a PENDING request that still counts as new.
    pub new_request_window: Duration,
    /// How many seen request ids to remember.
    pub known_ids_capacity: usize,
    /// How long a request without updates still counts as in flight.
    pub in_flight_max_age: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(250),
            new_request_window: Duration::from_secs(15),
            known_ids_capacity: KnownIds::DEFAULT_CAPACITY,
            in_flight_max_age: InFlightTracker::DEFAULT_MAX_AGE,
        }
    }
}

/// What one flush wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Distinct request ids in the batch.
    pub requests: usize,
    pub details: usize,
    pub pages: usize,
    pub infinite: usize,
    pub counts: usize,
    /// Dashboard, provider stats and cooldowns were invalidated.
    pub aggregates_invalidated: bool,
}

/// Keeps observed request views consistent with the push stream.
pub struct Reconciler {
    cache: Arc<QueryCache>,
    config: ReconcilerConfig,
    pending: IndexMap<u64, ProxyRequest>,
    deadline: Option<Instant>,
    known: KnownIds,
    in_flight: InFlightTracker,
}

impl Reconciler {
    pub fn new(cache: Arc<QueryCache>, config: ReconcilerConfig) -> Self {
        let known = KnownIds::new(config.known_ids_capacity);
        let in_flight =
            InFlightTracker::new(config.in_flight_max_age, InFlightTracker::DEFAULT_CAPACITY);
        Self {
            cache,
            config,
            pending: IndexMap::new(),
            deadline: None,
            known,
            in_flight,
        }
    }

    /// Live in-flight request totals.
    pub fn in_flight(&self) -> watch::Receiver<InFlightSummary> {
        self.in_flight.subscribe()
    }

    /// Request updates waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// When the outstanding flush is due, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Route one validated push event.
    pub fn handle_event(&mut self, event: &PushEvent) {
        match event {
            PushEvent::RequestUpdate(req) => self.enqueue(req),
            PushEvent::AttemptUpdate(attempt) => self.apply_attempt(attempt),
            PushEvent::CooldownUpdate => {
                self.cache.invalidate(&QueryKey::cooldowns());
            }
        }
    }

    fn enqueue(&mut self, req: &ProxyRequest) {
        self.in_flight.observe(req);
        self.pending.insert(req.id, req.clone());
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.config.flush_interval);
        }
    }

    fn apply_attempt(&self, attempt: &ProxyUpstreamAttempt) {
        let key = QueryKey::request_attempts(attempt.proxy_request_id);
        let wrote = self.cache.update_if_observed(&key, |current| {
            let list = match current {
                Some(QueryData::Attempts(list)) => Some(list.as_slice()),
                None => None,
                Some(_) => return None,
            };
            upsert_attempt(list, attempt).map(QueryData::Attempts)
        });
        trace!(attempt = attempt.id, request = attempt.proxy_request_id, wrote, "attempt update");
    }

    /// Apply every pending update to observed entries.
    ///
    /// `now` is the reference time for new-request detection.
    pub fn flush(&mut self, now: DateTime<Utc>) -> FlushReport {
        self.deadline = None;
        let batch = std::mem::take(&mut self.pending);
        let mut report = FlushReport {
            requests: batch.len(),
            ..FlushReport::default()
        };
        if batch.is_empty() {
            return report;
        }

        // Detail
        for req in batch.values() {
            let wrote = self
                .cache
                .update_if_observed(&QueryKey::request_detail(req.id), |current| match current {
                    Some(QueryData::Request(existing)) if existing == req => None,
                    _ => Some(QueryData::Request(req.clone())),
                });
            report.details += usize::from(wrote);
        }

        // Pages
        report.pages = self
            .cache
            .update_observed_with_prefix(&QueryKey::request_lists(), |key, data| {
                let params = key.list_params()?;
                let mut page = data.as_page()?.clone();
                let mut changed = false;
                for req in batch.values() {
                    changed |= merge_into_page(&mut page, req, params);
                }
                changed.then_some(QueryData::RequestPage(page))
            });

        // Infinite collections
        report.infinite = self
            .cache
            .update_observed_with_prefix(&QueryKey::request_infinites(), |key, data| {
                let filter = key.infinite_filter()?;
                let mut pages = data.as_pages()?.clone();
                let mut changed = false;
                for req in batch.values() {
                    changed |= merge_into_infinite(&mut pages, req, filter);
                }
                changed.then_some(QueryData::RequestPages(pages))
            });

        // Counts
        let fresh: Vec<&ProxyRequest> = batch
            .values()
            .filter(|req| is_new_request(req, &self.known, now, self.config.new_request_window))
            .collect();
        if !fresh.is_empty() {
            report.counts = self
                .cache
                .update_observed_with_prefix(&QueryKey::request_counts(), |key, data| {
                    let filter = key.count_filter()?;
                    let current = data.as_count()?;
                    let added = fresh.iter().filter(|req| filter.matches(req)).count();
                    let added = u64::try_from(added).ok().filter(|n| *n > 0)?;
                    Some(QueryData::Count(current.saturating_add(added)))
                });
        }
        for id in batch.keys() {
            self.known.insert(*id);
        }

        // Aggregates that are not maintained incrementally
        if batch.values().any(|req| req.status.is_terminal()) {
            self.cache.invalidate(&QueryKey::dashboard());
            self.cache.invalidate(&QueryKey::provider_stats());
            self.cache.invalidate(&QueryKey::cooldowns());
            report.aggregates_invalidated = true;
        }

        report
    }

    /// Consume `events` until `cancel` fires or the stream closes.
    ///
    /// Pending updates are dropped on exit; no flush runs after teardown.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<Arc<PushEvent>>,
        cancel: CancellationToken,
    ) {
        let mut prune = tokio::time::interval(IN_FLIGHT_PRUNE_INTERVAL);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = sleep_until(self.deadline) => {
                    let report = self.flush(Utc::now());
                    debug!(?report, "flushed request updates");
                }
                _ = prune.tick() => self.in_flight.prune(),
                received = events.recv() => match received {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Terminal updates may be among the skipped events.
                        self.in_flight.clear();
                        warn!(skipped, "reconciler fell behind the push stream");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!(dropped = self.pending.len(), "reconciler stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
