// ── Cached payloads and per-entry state ──

use std::collections::BTreeMap;
use std::sync::Arc;

use maxxctl_api::{Cooldown, CursorPage, ProxyRequest, ProxyUpstreamAttempt};
use tokio::time::Instant;

/// Pages of an infinite collection, newest page first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InfinitePages {
    pub pages: Vec<CursorPage<ProxyRequest>>,
    /// Page size requested when the collection was fetched. The first page
    /// is truncated to this when new requests are prepended.
    pub page_limit: Option<u32>,
}

impl InfinitePages {
    /// All items across pages in display order.
    pub fn items(&self) -> impl Iterator<Item = &ProxyRequest> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    /// Whether the server has older requests beyond the last page.
    pub fn has_more(&self) -> bool {
        self.pages.last().is_some_and(|p| p.has_more)
    }

    /// Cursor for fetching the next (older) page.
    pub fn next_cursor(&self) -> Option<u64> {
        self.pages.last().and_then(|p| p.last_id)
    }
}

/// Payload of a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Request(ProxyRequest),
    RequestPage(CursorPage<ProxyRequest>),
    RequestPages(InfinitePages),
    Count(u64),
    Attempts(Vec<ProxyUpstreamAttempt>),
    Cooldowns(Vec<Cooldown>),
    Settings(BTreeMap<String, String>),
    Setting(String),
    Json(serde_json::Value),
}

impl QueryData {
    pub fn as_request(&self) -> Option<&ProxyRequest> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&CursorPage<ProxyRequest>> {
        match self {
            Self::RequestPage(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pages(&self) -> Option<&InfinitePages> {
        match self {
            Self::RequestPages(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_attempts(&self) -> Option<&[ProxyUpstreamAttempt]> {
        match self {
            Self::Attempts(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_cooldowns(&self) -> Option<&[Cooldown]> {
        match self {
            Self::Cooldowns(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_settings(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Settings(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_setting(&self) -> Option<&str> {
        match self {
            Self::Setting(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Whether a fetch for the entry is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}

/// Everything an observer sees for one key.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub data: Option<Arc<QueryData>>,
    /// When `data` was last written.
    pub updated_at: Option<Instant>,
    /// Marked by invalidation; the next read refetches.
    pub stale: bool,
    pub fetch_status: FetchStatus,
    /// Message of the last failed fetch, cleared on success.
    pub error: Option<String>,
}

impl QueryState {
    /// No data yet and a fetch in progress.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }
}
