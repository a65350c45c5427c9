// ── Reactive query cache ──
//
// Keyed query results with observer counting, prefix invalidation and
// push-based change notification.

mod data;
mod key;
mod observer;
mod query_cache;

pub use data::{FetchStatus, InfinitePages, QueryData, QueryState};
pub use key::{KeyPart, KeyTarget, QueryKey};
pub use observer::{QueryObserver, QueryStream};
pub use query_cache::QueryCache;
