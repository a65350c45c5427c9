//! Reactive data layer between `maxxctl-api` and consumers (CLI / TUI).
//!
//! - **[`Console`]**: Session facade. Reads return a [`QueryObserver`]
//!   after fetching stale entries; [`connect()`](Console::connect) adds the
//!   push stream, reconciliation and background refetching.
//!   [`Console::oneshot()`] runs a single CLI invocation without push.
//!
//! - **[`QueryCache`]**: Keyed, observer-counted storage. Each entry is a
//!   `tokio::sync::watch` channel whose receiver count is its observer
//!   count; writes that depend on observation happen under the entry lock.
//!
//! - **[`Reconciler`]**: Folds push events into observed entries:
//!   bounded-latency batching of request updates, pure page merges,
//!   optimistic count increments and aggregate invalidation.
//!
//! - **[`CooldownAggregator`]**: Provider cooldown lookups and
//!   remaining-time formatting over the cached cooldown list, with an
//!   expiry scheduler that invalidates the list as cooldowns lapse.

pub mod cache;
pub mod config;
pub mod console;
pub mod cooldown;
pub mod error;
pub mod reconcile;

pub use cache::{FetchStatus, InfinitePages, QueryCache, QueryData, QueryKey, QueryObserver, QueryState};
pub use config::{ConsoleConfig, TlsVerification};
pub use console::Console;
pub use cooldown::{CooldownAggregator, CooldownLookup, CooldownView};
pub use error::CoreError;
pub use reconcile::{InFlightSummary, Reconciler, ReconcilerConfig};

pub use maxxctl_api::{
    ConnectionState, Cooldown, CooldownReason, CursorPage, PaginationParams, ProxyRequest,
    ProxyUpstreamAttempt, RequestFilter, RequestStatus,
};
