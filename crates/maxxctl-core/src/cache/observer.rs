// ── Query observers ──
//
// An observer is a live subscription to one cache key. The cache counts
// observers through the receiver count of the entry's watch channel, so
// dropping an observer is the unsubscribe.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::data::{QueryData, QueryState};
use super::key::QueryKey;

/// A subscription to one cache entry.
///
/// Provides point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`. Cloning an
/// observer registers another observer.
#[derive(Debug, Clone)]
pub struct QueryObserver {
    key: QueryKey,
    receiver: watch::Receiver<QueryState>,
}

impl QueryObserver {
    pub(crate) fn new(key: QueryKey, receiver: watch::Receiver<QueryState>) -> Self {
        Self { key, receiver }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The latest state.
    pub fn state(&self) -> QueryState {
        self.receiver.borrow().clone()
    }

    /// The latest data, if any has been loaded.
    pub fn data(&self) -> Option<Arc<QueryData>> {
        self.receiver.borrow().data.clone()
    }

    /// Whether the entry changed since this observer last looked.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change and return the new state.
    /// Returns `None` once the entry has been removed from the cache.
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until `f` holds for the state, returning that state.
    pub async fn wait_for(&mut self, mut f: impl FnMut(&QueryState) -> bool) -> Option<QueryState> {
        let state = self.receiver.wait_for(|s| f(s)).await.ok()?;
        Some(state.clone())
    }

    /// Convert into a `Stream` yielding the current state, then every change.
    pub fn into_stream(self) -> QueryStream {
        QueryStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct QueryStream {
    inner: WatchStream<QueryState>,
}

impl Stream for QueryStream {
    type Item = QueryState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
