// ── Console facade ──
//
// Session lifecycle for one maxx server: the push stream, the reconciler,
// invalidation-driven refetching, cooldown expiry and cache GC all hang
// off a per-connection cancellation token.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use maxxctl_api::{
    AdminClient, ConnectionState, CursorPage, PaginationParams, ProxyRequest, PushHandle,
    RequestFilter,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{InfinitePages, KeyTarget, QueryCache, QueryData, QueryKey, QueryObserver};
use crate::config::ConsoleConfig;
use crate::cooldown::{CooldownAggregator, run_expiry_scheduler};
use crate::error::CoreError;
use crate::reconcile::{InFlightSummary, Reconciler, ReconcilerConfig};

const GC_INTERVAL: Duration = Duration::from_secs(60);
const LOAD_MORE_ATTEMPTS: usize = 3;

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Reads work without
/// [`connect`](Self::connect); connecting adds live push updates and
/// background refetching. Dropping the last clone stops background tasks
/// without waiting for them; [`disconnect`](Self::disconnect) also joins them.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    client: AdminClient,
    cache: Arc<QueryCache>,
    cooldowns: CooldownAggregator,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    session: Mutex<Option<Session>>,
}

impl Drop for ConsoleInner {
    fn drop(&mut self) {
        // Tasks hold weak handles, so this runs with the last clone.
        self.cancel.cancel();
    }
}

/// Everything owned by one `connect()`.
struct Session {
    cancel: CancellationToken,
    push: Option<PushHandle>,
    in_flight: watch::Receiver<InFlightSummary>,
    tasks: Vec<JoinHandle<()>>,
}

impl Console {
    /// Build a console for `config`. Does not connect.
    pub fn new(config: ConsoleConfig) -> Result<Self, CoreError> {
        let client = AdminClient::new(config.url.clone(), &config.transport())?;
        Ok(Self::with_client(config, client))
    }

    /// Build a console around an existing client.
    pub fn with_client(config: ConsoleConfig, client: AdminClient) -> Self {
        let cache = Arc::new(QueryCache::new());
        let cooldowns =
            CooldownAggregator::new(client.clone(), Arc::clone(&cache), config.cooldown_stale_time);
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                client,
                cache,
                cooldowns,
                connection_state,
                cancel: CancellationToken::new(),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.inner.cache
    }

    pub fn client(&self) -> &AdminClient {
        &self.inner.client
    }

    /// Cooldown lookups and mutations.
    pub fn cooldown(&self) -> &CooldownAggregator {
        &self.inner.cooldowns
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start the push stream and background tasks.
    ///
    /// A second call while connected is a no-op.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut session = self.inner.session.lock().await;
        if session.is_some() {
            debug!("already connected");
            return Ok(());
        }

        let config = &self.inner.config;
        let cache = Arc::clone(&self.inner.cache);
        let cancel = self.inner.cancel.child_token();
        let mut tasks = Vec::new();

        // Subscribe before anything can invalidate.
        let invalidations = cache.invalidations();
        tasks.push(tokio::spawn(refetch_task(
            Arc::downgrade(&self.inner),
            invalidations,
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(run_expiry_scheduler(Arc::clone(&cache), cancel.clone())));
        tasks.push(tokio::spawn(gc_task(
            Arc::clone(&cache),
            config.cache_time,
            cancel.clone(),
        )));

        let reconciler = Reconciler::new(
            Arc::clone(&cache),
            ReconcilerConfig {
                flush_interval: config.flush_interval,
                new_request_window: config.new_request_window,
                ..ReconcilerConfig::default()
            },
        );
        let in_flight = reconciler.in_flight();

        let push = if config.websocket_enabled {
            let ws_url = self.inner.client.push_url()?;
            let _ = self.inner.connection_state.send(ConnectionState::Connecting);
            let handle = PushHandle::connect(
                ws_url.clone(),
                config.reconnect.clone(),
                cancel.clone(),
                config.transport().bearer(),
            );
            tasks.push(tokio::spawn(reconciler.run(handle.subscribe(), cancel.clone())));
            tasks.push(tokio::spawn(state_task(
                Arc::downgrade(&self.inner),
                handle.state(),
                cancel.clone(),
            )));
            info!(url = %ws_url, "push stream started");
            Some(handle)
        } else {
            let _ = self.inner.connection_state.send(ConnectionState::Connected);
            None
        };

        *session = Some(Session {
            cancel,
            push,
            in_flight,
            tasks,
        });
        info!(url = %config.url, "console connected");
        Ok(())
    }

    /// Stop the push stream and every background task.
    ///
    /// Pending reconciler updates are dropped and no timer fires afterward.
    pub async fn disconnect(&self) {
        let Some(session) = self.inner.session.lock().await.take() else {
            return;
        };
        session.cancel.cancel();
        if let Some(push) = session.push {
            push.close().await;
        }
        for handle in session.tasks {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        info!("console disconnected");
    }

    /// Build, run `f` without the push stream, then tear down.
    pub async fn oneshot<F, Fut, T>(config: ConsoleConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Console) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.websocket_enabled = false;

        let console = Console::new(cfg)?;
        console.connect().await?;
        let result = f(console.clone()).await;
        console.disconnect().await;
        result
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// In-flight request totals seen on the push stream, while connected.
    pub async fn in_flight(&self) -> Option<watch::Receiver<InFlightSummary>> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.in_flight.clone())
    }

    // ── Query reads ──────────────────────────────────────────────────

    /// One cursor page of requests.
    pub async fn requests(&self, params: PaginationParams) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::request_list(params), None).await
    }

    /// First page of an infinite request collection.
    pub async fn requests_infinite(
        &self,
        filter: RequestFilter,
        page_limit: Option<u32>,
    ) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::request_infinite(filter), page_limit).await
    }

    /// Append the next older page to an infinite collection.
    ///
    /// The page is appended to the entry as it is once the fetch returns,
    /// so pushed updates merged in the meantime survive. If the merge moved
    /// the collection's cursor while the page was in flight, the page is
    /// fetched again from the new cursor. Returns `false` when there is
    /// nothing more to load.
    pub async fn load_more(&self, filter: RequestFilter) -> Result<bool, CoreError> {
        let key = QueryKey::request_infinite(filter);
        let cache = &self.inner.cache;

        for _ in 0..LOAD_MORE_ATTEMPTS {
            let Some(current) = cache.get(&key) else {
                return Err(CoreError::NotReady {
                    what: key.to_string(),
                });
            };
            let Some(pages) = current.as_pages() else {
                return Err(CoreError::Internal(format!("{key} does not hold pages")));
            };
            let Some(before) = pages.next_cursor().filter(|_| pages.has_more()) else {
                return Ok(false);
            };
            let loaded = pages.pages.len();
            let params = PaginationParams {
                limit: pages.page_limit,
                before: Some(before),
                provider_id: filter.provider_id,
                status: filter.status,
            };

            cache.mark_fetching(&key);
            let page = match self.inner.client.get_proxy_requests(&params).await {
                Ok(page) => page,
                Err(e) => {
                    let err = CoreError::from(e);
                    cache.mark_error(&key, err.to_string());
                    return Err(err);
                }
            };

            // Only append where the fetched page continues the collection.
            let appended = cache.update(&key, |data| {
                let pages = data.as_pages()?;
                if pages.pages.len() != loaded || pages.next_cursor() != Some(before) {
                    return None;
                }
                Some(QueryData::RequestPages(append_page(pages, page)))
            });
            if appended {
                return Ok(true);
            }
            cache.mark_idle(&key);
            debug!(%key, before, "collection moved while loading more");
        }
        Ok(false)
    }

    pub async fn request(&self, id: u64) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::request_detail(id), None).await
    }

    pub async fn attempts(&self, id: u64) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::request_attempts(id), None).await
    }

    pub async fn requests_count(&self, filter: RequestFilter) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::request_count(filter), None).await
    }

    pub async fn cooldowns(&self) -> Result<QueryObserver, CoreError> {
        self.inner.cooldowns.load().await
    }

    pub async fn settings(&self) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::settings(), None).await
    }

    pub async fn setting(&self, key: &str) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::setting(key), None).await
    }

    pub async fn dashboard(&self) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::dashboard(), None).await
    }

    pub async fn provider_stats(&self) -> Result<QueryObserver, CoreError> {
        self.read(QueryKey::provider_stats(), None).await
    }

    /// Fetch `key` again regardless of freshness.
    pub async fn refetch(&self, key: &QueryKey) -> Result<(), CoreError> {
        let page_limit = self
            .inner
            .cache
            .get(key)
            .and_then(|d| d.as_pages().and_then(|p| p.page_limit));
        self.fetch(key, page_limit).await
    }

    async fn read(&self, key: QueryKey, page_limit: Option<u32>) -> Result<QueryObserver, CoreError> {
        let observer = self.inner.cache.observe(key.clone());
        if !self.inner.cache.is_fresh(&key, self.inner.config.stale_time) {
            self.fetch(&key, page_limit).await?;
        }
        Ok(observer)
    }

    async fn fetch(&self, key: &QueryKey, page_limit: Option<u32>) -> Result<(), CoreError> {
        let Some(target) = key.target() else {
            return Err(CoreError::Internal(format!("{key} cannot be fetched")));
        };
        if target == KeyTarget::Cooldowns {
            return self.inner.cooldowns.refetch().await;
        }

        let client = &self.inner.client;
        let cache = &self.inner.cache;
        debug!(%key, "fetching");
        cache
            .fetch_with(key, async {
                let data = match target {
                    KeyTarget::List(params) => {
                        QueryData::RequestPage(client.get_proxy_requests(params).await?)
                    }
                    KeyTarget::Infinite(filter) => {
                        let loaded = cache
                            .get(key)
                            .and_then(|d| d.as_pages().map(|p| p.pages.len()))
                            .unwrap_or(1);
                        QueryData::RequestPages(
                            fetch_pages(client, *filter, page_limit, loaded).await?,
                        )
                    }
                    KeyTarget::Detail(id) => QueryData::Request(client.get_proxy_request(id).await?),
                    KeyTarget::Attempts(id) => {
                        QueryData::Attempts(client.get_proxy_upstream_attempts(id).await?)
                    }
                    KeyTarget::Count(filter) => QueryData::Count(
                        client
                            .get_proxy_requests_count(filter.provider_id, filter.status)
                            .await?,
                    ),
                    KeyTarget::Cooldowns => QueryData::Cooldowns(client.get_cooldowns().await?),
                    KeyTarget::Dashboard => QueryData::Json(client.get_dashboard().await?),
                    KeyTarget::ProviderStats => QueryData::Json(client.get_provider_stats().await?),
                    KeyTarget::Settings => QueryData::Settings(client.get_settings().await?),
                    KeyTarget::Setting(name) => QueryData::Setting(client.get_setting(name).await?),
                };
                Ok::<_, CoreError>(data)
            })
            .await
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn clear_cooldown(&self, provider_id: u64) -> Result<(), CoreError> {
        self.inner.cooldowns.clear_cooldown(provider_id).await
    }

    pub async fn set_cooldown(
        &self,
        provider_id: u64,
        until: DateTime<Utc>,
        client_type: Option<&str>,
    ) -> Result<(), CoreError> {
        self.inner
            .cooldowns
            .set_cooldown(provider_id, until, client_type)
            .await
    }

    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.inner.client.update_setting(key, value).await?;
        self.inner.cache.invalidate(&QueryKey::settings());
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<(), CoreError> {
        self.inner.client.delete_setting(key).await?;
        self.inner.cache.invalidate(&QueryKey::settings());
        Ok(())
    }
}

/// `pages` with `page` appended, minus requests already loaded.
///
/// The server cursor of `page` is kept so the next load continues where
/// the server left off.
fn append_page(pages: &InfinitePages, mut page: CursorPage<ProxyRequest>) -> InfinitePages {
    let loaded: HashSet<u64> = pages.items().map(|r| r.id).collect();
    page.items.retain(|r| !loaded.contains(&r.id));
    page.first_id = page.items.first().map(|r| r.id);

    let mut next = pages.clone();
    next.pages.push(page);
    next
}

/// Reload up to `pages` pages of an infinite collection, newest first.
async fn fetch_pages(
    client: &AdminClient,
    filter: RequestFilter,
    page_limit: Option<u32>,
    pages: usize,
) -> Result<InfinitePages, CoreError> {
    let mut out = InfinitePages {
        pages: Vec::new(),
        page_limit,
    };
    let mut before = None;
    for _ in 0..pages.max(1) {
        let page = client
            .get_proxy_requests(&PaginationParams {
                limit: page_limit,
                before,
                provider_id: filter.provider_id,
                status: filter.status,
            })
            .await?;
        let more = page.has_more;
        before = page.last_id;
        out.pages.push(page);
        if !more || before.is_none() {
            break;
        }
    }
    Ok(out)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Refetch observed entries as they are invalidated.
async fn refetch_task(
    console: Weak<ConsoleInner>,
    mut invalidations: tokio::sync::broadcast::Receiver<QueryKey>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = invalidations.recv() => match received {
                Ok(key) => {
                    if key.target().is_none() {
                        continue;
                    }
                    let Some(inner) = console.upgrade() else { break };
                    if let Err(e) = (Console { inner }).refetch(&key).await {
                        warn!(%key, error = %e, "refetch after invalidation failed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "refetcher lagged; some entries refetch on next read");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

/// Mirror push connection state onto the console.
async fn state_task(
    console: Weak<ConsoleInner>,
    mut push_state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        let state = *push_state.borrow_and_update();
        let Some(inner) = console.upgrade() else { break };
        let _ = inner.connection_state.send(state);
        drop(inner);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = push_state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Periodically drop unobserved entries.
async fn gc_task(cache: Arc<QueryCache>, cache_time: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(GC_INTERVAL);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let removed = cache.gc(cache_time);
                if removed > 0 {
                    debug!(removed, "cache gc");
                }
            }
        }
    }
}
