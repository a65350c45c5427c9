// ── In-flight request tracking ──
//
// Counts requests seen on the push stream that have not reached a terminal
// status, grouped by provider and client type. A terminal update can be
// missed (lagged receiver, reconnect gap), so entries also age out and the
// map is capped.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use maxxctl_api::{ProxyRequest, RequestStatus};
use tokio::sync::watch;
use tokio::time::Instant;

/// Snapshot of in-flight requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlightSummary {
    pub total: usize,
    pub by_provider: BTreeMap<u64, usize>,
    pub by_client_type: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct Slot {
    provider_id: u64,
    client_type: String,
    seen: Instant,
}

#[derive(Debug)]
pub(crate) struct InFlightTracker {
    active: HashMap<u64, Slot>,
    max_age: Duration,
    capacity: usize,
    summary: watch::Sender<InFlightSummary>,
}

impl InFlightTracker {
    pub(crate) const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);
    pub(crate) const DEFAULT_CAPACITY: usize = 10_000;

    pub(crate) fn new(max_age: Duration, capacity: usize) -> Self {
        let (summary, _) = watch::channel(InFlightSummary::default());
        Self {
            active: HashMap::new(),
            max_age,
            capacity: capacity.max(1),
            summary,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<InFlightSummary> {
        self.summary.subscribe()
    }

    /// Track `req` until it reaches a terminal status or ages out.
    pub(crate) fn observe(&mut self, req: &ProxyRequest) {
        let now = Instant::now();
        let mut changed = match req.status {
            RequestStatus::Pending | RequestStatus::InProgress => {
                let previous = self.active.insert(
                    req.id,
                    Slot {
                        provider_id: req.provider_id,
                        client_type: req.client_type.clone(),
                        seen: now,
                    },
                );
                previous.is_none_or(|p| {
                    p.provider_id != req.provider_id || p.client_type != req.client_type
                })
            }
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled => {
                self.active.remove(&req.id).is_some()
            }
            RequestStatus::Unknown => false,
        };
        changed |= self.evict(now);
        if changed {
            self.publish();
        }
    }

    /// Drop entries not updated within the max age.
    pub(crate) fn prune(&mut self) {
        if self.evict(Instant::now()) {
            self.publish();
        }
    }

    /// Forget everything; used once updates may have been missed.
    pub(crate) fn clear(&mut self) {
        if !self.active.is_empty() {
            self.active.clear();
            self.publish();
        }
    }

    fn evict(&mut self, now: Instant) -> bool {
        let before = self.active.len();
        let max_age = self.max_age;
        self.active
            .retain(|_, slot| now.saturating_duration_since(slot.seen) < max_age);
        while self.active.len() > self.capacity {
            let oldest = self
                .active
                .iter()
                .min_by_key(|(_, slot)| slot.seen)
                .map(|(id, _)| *id);
            let Some(id) = oldest else { break };
            self.active.remove(&id);
        }
        self.active.len() != before
    }

    fn publish(&self) {
        let mut summary = InFlightSummary {
            total: self.active.len(),
            ..InFlightSummary::default()
        };
        for slot in self.active.values() {
            *summary.by_provider.entry(slot.provider_id).or_default() += 1;
            *summary
                .by_client_type
                .entry(slot.client_type.clone())
                .or_default() += 1;
        }
        self.summary.send_replace(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, provider_id: u64, client: &str, status: RequestStatus) -> ProxyRequest {
        ProxyRequest {
            id,
            provider_id,
            client_type: client.into(),
            status,
            ..ProxyRequest::default()
        }
    }

    fn tracker() -> InFlightTracker {
        InFlightTracker::new(InFlightTracker::DEFAULT_MAX_AGE, InFlightTracker::DEFAULT_CAPACITY)
    }

    #[test]
    fn counts_until_terminal() {
        let mut tracker = tracker();
        let rx = tracker.subscribe();

        tracker.observe(&req(1, 7, "claude", RequestStatus::Pending));
        tracker.observe(&req(2, 7, "codex", RequestStatus::InProgress));
        tracker.observe(&req(3, 8, "claude", RequestStatus::Pending));

        let summary = rx.borrow().clone();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_provider.get(&7), Some(&2));
        assert_eq!(summary.by_client_type.get("claude"), Some(&2));

        tracker.observe(&req(1, 7, "claude", RequestStatus::Completed));
        tracker.observe(&req(2, 7, "codex", RequestStatus::Cancelled));
        let summary = rx.borrow().clone();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.by_provider.get(&7), None);
        assert_eq!(summary.by_provider.get(&8), Some(&1));
    }

    #[test]
    fn repeated_updates_do_not_double_count() {
        let mut tracker = tracker();
        let mut rx = tracker.subscribe();

        tracker.observe(&req(1, 7, "claude", RequestStatus::Pending));
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        tracker.observe(&req(1, 7, "claude", RequestStatus::InProgress));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_without_terminal_update_age_out() {
        let mut tracker = InFlightTracker::new(Duration::from_secs(60), 100);
        let rx = tracker.subscribe();

        tracker.observe(&req(1, 7, "claude", RequestStatus::InProgress));
        tokio::time::advance(Duration::from_secs(45)).await;
        tracker.observe(&req(2, 7, "claude", RequestStatus::Pending));
        tracker.prune();
        assert_eq!(rx.borrow().total, 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        tracker.prune();
        assert_eq!(rx.borrow().total, 1);
        assert_eq!(rx.borrow().by_provider.get(&7), Some(&1));

        tokio::time::advance(Duration::from_secs(60)).await;
        tracker.prune();
        assert_eq!(rx.borrow().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recently_seen() {
        let mut tracker = InFlightTracker::new(InFlightTracker::DEFAULT_MAX_AGE, 2);
        for id in 1..=3 {
            tracker.observe(&req(id, id, "codex", RequestStatus::Pending));
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        let summary = tracker.subscribe().borrow().clone();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_provider.get(&1), None);
    }

    #[test]
    fn clear_resets_summary() {
        let mut tracker = tracker();
        let rx = tracker.subscribe();
        tracker.observe(&req(1, 7, "claude", RequestStatus::Pending));
        tracker.clear();
        assert_eq!(*rx.borrow(), InFlightSummary::default());
    }
}
