// ── Cooldown expiry scheduler ──
//
// One timer per loaded cooldown, fired shortly after it lapses so views
// re-evaluate without polling. The queue is rebuilt from scratch whenever
// the cached list changes, so refetches never stack timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use maxxctl_api::Cooldown;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, trace};

use crate::cache::{QueryCache, QueryData, QueryKey};

/// Slack added after `until` before invalidating.
pub const EXPIRY_GRACE: Duration = Duration::from_millis(100);

/// Provider, client type and end of one cooldown.
pub type TimerKey = (u64, String, DateTime<Utc>);

/// Delay until each still-future cooldown lapses, plus [`EXPIRY_GRACE`].
///
/// One entry per loaded cooldown; exact duplicates share a timer.
pub fn expiry_delays(cooldowns: &[Cooldown], now: DateTime<Utc>) -> HashMap<TimerKey, Duration> {
    let mut delays = HashMap::new();
    for cd in cooldowns {
        let Some(until) = cd.until else { continue };
        let Some(remaining) = until
            .signed_duration_since(now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
        else {
            continue;
        };
        delays.insert(
            (cd.provider_id, cd.client_type.clone(), until),
            remaining + EXPIRY_GRACE,
        );
    }
    delays
}

/// Invalidate `cooldowns` as each loaded cooldown expires, until `cancel`.
///
/// Holds an observer on the entry for its whole lifetime.
pub(crate) async fn run_expiry_scheduler(cache: Arc<QueryCache>, cancel: CancellationToken) {
    let mut observer = cache.observe(QueryKey::cooldowns());
    let mut queue: DelayQueue<TimerKey> = DelayQueue::new();
    let mut armed: Option<Arc<QueryData>> = None;

    rearm(&mut queue, &mut armed, observer.data());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(expired) = queue.next(), if !queue.is_empty() => {
                let (provider_id, client_type, _) = expired.into_inner();
                debug!(provider_id, %client_type, "cooldown expired");
                cache.invalidate(&QueryKey::cooldowns());
            }
            changed = observer.changed() => match changed {
                Some(state) => rearm(&mut queue, &mut armed, state.data),
                None => break,
            },
        }
    }
    trace!(pending = queue.len(), "cooldown scheduler stopped");
}

fn rearm(
    queue: &mut DelayQueue<TimerKey>,
    armed: &mut Option<Arc<QueryData>>,
    data: Option<Arc<QueryData>>,
) {
    // Stale marks and fetch status also notify; only new data re-arms.
    let same = match (armed.as_ref(), data.as_ref()) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if same {
        return;
    }

    queue.clear();
    if let Some(list) = data.as_deref().and_then(QueryData::as_cooldowns) {
        for (key, delay) in expiry_delays(list, Utc::now()) {
            queue.insert(key, delay);
        }
    }
    trace!(timers = queue.len(), "cooldown timers armed");
    *armed = data;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maxxctl_api::CooldownReason;

    fn cooldown(provider_id: u64, client_type: &str, until: DateTime<Utc>) -> Cooldown {
        Cooldown {
            provider_id,
            provider_name: None,
            client_type: client_type.into(),
            until: Some(until),
            reason: CooldownReason::ServerError,
        }
    }

    #[test]
    fn delays_skip_past_and_dedupe() {
        let now = Utc::now();
        let at = |secs| now + chrono::Duration::seconds(secs);
        let list = vec![
            cooldown(1, "", at(10)),
            cooldown(1, "", at(20)),
            cooldown(1, "", at(20)),
            cooldown(1, "codex", at(5)),
            cooldown(2, "", now - chrono::Duration::seconds(5)),
            Cooldown {
                until: None,
                ..cooldown(3, "", now)
            },
        ];

        let delays = expiry_delays(&list, now);
        assert_eq!(delays.len(), 3);
        assert_eq!(
            delays.get(&(1, String::new(), at(10))),
            Some(&(Duration::from_secs(10) + EXPIRY_GRACE))
        );
        assert_eq!(
            delays.get(&(1, String::new(), at(20))),
            Some(&(Duration::from_secs(20) + EXPIRY_GRACE))
        );
        assert_eq!(
            delays.get(&(1, "codex".to_owned(), at(5))),
            Some(&(Duration::from_secs(5) + EXPIRY_GRACE))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_of_two_cooldowns_for_one_provider_invalidates() {
        let cache = Arc::new(QueryCache::new());
        let now = Utc::now();
        cache.set(
            QueryKey::cooldowns(),
            QueryData::Cooldowns(vec![
                cooldown(1, "", now + chrono::Duration::seconds(60)),
                cooldown(1, "", now + chrono::Duration::seconds(2)),
            ]),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_expiry_scheduler(Arc::clone(&cache), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(cache.state(&QueryKey::cooldowns()).unwrap().stale);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn invalidates_once_after_expiry() {
        let cache = Arc::new(QueryCache::new());
        let until = Utc::now() + chrono::Duration::seconds(2);
        cache.set(
            QueryKey::cooldowns(),
            QueryData::Cooldowns(vec![cooldown(1, "", until)]),
        );
        let mut invalidations = cache.invalidations();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_expiry_scheduler(Arc::clone(&cache), cancel.clone()));

        // Re-setting the same list must not stack a second timer.
        tokio::time::sleep(Duration::from_millis(500)).await;
        cache.set(
            QueryKey::cooldowns(),
            QueryData::Cooldowns(vec![cooldown(1, "", until)]),
        );

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(!cache.state(&QueryKey::cooldowns()).unwrap().stale);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(cache.state(&QueryKey::cooldowns()).unwrap().stale);
        assert_eq!(invalidations.try_recv().unwrap(), QueryKey::cooldowns());
        assert!(invalidations.try_recv().is_err());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_timer_fires_after_cancel() {
        let cache = Arc::new(QueryCache::new());
        cache.set(
            QueryKey::cooldowns(),
            QueryData::Cooldowns(vec![cooldown(
                1,
                "",
                Utc::now() + chrono::Duration::seconds(1),
            )]),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_expiry_scheduler(Arc::clone(&cache), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!cache.state(&QueryKey::cooldowns()).unwrap().stale);
    }
}
