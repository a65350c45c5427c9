// ── New-request detection ──
//
// The push stream has no explicit "created" event, so a request counts as
// new when this session has not seen its id, it is still PENDING, and it
// started recently. Late historical updates fail the time check.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use maxxctl_api::{ProxyRequest, RequestStatus};

/// Bounded set of request ids seen on the push stream.
///
/// Evicts the oldest id once `capacity` is reached.
#[derive(Debug)]
pub struct KnownIds {
    order: VecDeque<u64>,
    ids: HashSet<u64>,
    capacity: usize,
}

impl KnownIds {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Record `id`, returning `true` if it was not known.
    pub fn insert(&mut self, id: u64) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for KnownIds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Whether `req` should bump request counters at `now`.
///
/// A start time further than `window` in the future is treated as clock
/// skew and rejected as well.
pub fn is_new_request(
    req: &ProxyRequest,
    known: &KnownIds,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    if known.contains(req.id) || req.status != RequestStatus::Pending {
        return false;
    }
    let Some(start) = req.start_time else {
        return false;
    };
    let Ok(window) = chrono::Duration::from_std(window) else {
        return false;
    };
    let age = now.signed_duration_since(start);
    age <= window && age >= -window
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(15);

    fn pending(id: u64, start: DateTime<Utc>) -> ProxyRequest {
        ProxyRequest {
            id,
            status: RequestStatus::Pending,
            start_time: Some(start),
            ..ProxyRequest::default()
        }
    }

    #[test]
    fn fresh_pending_request_is_new() {
        let now = Utc::now();
        let known = KnownIds::default();
        assert!(is_new_request(&pending(1, now), &known, now, WINDOW));
        assert!(is_new_request(
            &pending(1, now - chrono::Duration::seconds(15)),
            &known,
            now,
            WINDOW
        ));
    }

    #[test]
    fn old_or_progressed_requests_are_not_new() {
        let now = Utc::now();
        let known = KnownIds::default();

        let stale = pending(1, now - chrono::Duration::seconds(16));
        assert!(!is_new_request(&stale, &known, now, WINDOW));

        let mut running = pending(2, now);
        running.status = RequestStatus::InProgress;
        assert!(!is_new_request(&running, &known, now, WINDOW));

        let mut undated = pending(3, now);
        undated.start_time = None;
        assert!(!is_new_request(&undated, &known, now, WINDOW));

        let future = pending(4, now + chrono::Duration::seconds(60));
        assert!(!is_new_request(&future, &known, now, WINDOW));
    }

    #[test]
    fn known_ids_are_not_new() {
        let now = Utc::now();
        let mut known = KnownIds::default();
        known.insert(1);
        assert!(!is_new_request(&pending(1, now), &known, now, WINDOW));
    }

    #[test]
    fn known_ids_are_bounded() {
        let mut known = KnownIds::new(3);
        for id in 1..=5 {
            assert!(known.insert(id));
        }
        assert!(!known.insert(5));
        assert_eq!(known.len(), 3);
        assert!(!known.contains(1));
        assert!(!known.contains(2));
        assert!(known.contains(3));
        assert!(known.contains(5));
    }
}
