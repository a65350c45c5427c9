// Wire types for the maxx admin API.
//
// Field names follow the server's JSON (camelCase with `ID` suffixes).
// Timestamps are RFC 3339, durations are Go `time.Duration` nanoseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── RequestStatus ────────────────────────────────────────────────────

/// Lifecycle of a proxied request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RequestStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    /// Any status this client does not know about.
    #[serde(other)]
    #[strum(disabled)]
    Unknown,
}

impl RequestStatus {
    /// Terminal statuses change aggregates (dashboard, provider stats,
    /// cooldowns) that are not maintained incrementally.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

// ── ProxyRequest ─────────────────────────────────────────────────────

/// One request that went through the proxy.
///
/// The push stream carries a slimmed copy (request/response bodies
/// stripped); the detail endpoint returns the same shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub id: u64,
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(rename = "providerID", default)]
    pub provider_id: u64,
    #[serde(rename = "routeID", default)]
    pub route_id: u64,
    #[serde(rename = "projectID", default)]
    pub project_id: u64,
    #[serde(default)]
    pub client_type: String,
    #[serde(default)]
    pub request_model: String,
    #[serde(default)]
    pub response_model: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Total duration in nanoseconds.
    #[serde(default)]
    pub duration: u64,
    /// Time to first token in nanoseconds.
    #[serde(default)]
    pub ttft: u64,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub input_token_count: u64,
    #[serde(default)]
    pub output_token_count: u64,
    #[serde(default)]
    pub cache_read_count: u64,
    #[serde(default)]
    pub cache_write_count: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── ProxyUpstreamAttempt ─────────────────────────────────────────────

/// A single upstream call made while serving a [`ProxyRequest`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyUpstreamAttempt {
    pub id: u64,
    #[serde(rename = "proxyRequestID")]
    pub proxy_request_id: u64,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(rename = "providerID", default)]
    pub provider_id: u64,
    #[serde(default)]
    pub request_model: String,
    #[serde(default)]
    pub response_model: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub ttft: u64,
    #[serde(default)]
    pub input_token_count: u64,
    #[serde(default)]
    pub output_token_count: u64,
    #[serde(default)]
    pub cost: f64,
}

// ── Cooldown ─────────────────────────────────────────────────────────

/// Why a provider was put into cooldown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CooldownReason {
    ServerError,
    NetworkError,
    QuotaExhausted,
    RateLimitExceeded,
    ConcurrentLimit,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A time-boxed routing suppression for a provider.
///
/// Whether it is active is a function of `until` and the evaluation time;
/// there is no stored "expired" flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooldown {
    #[serde(rename = "providerID")]
    pub provider_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    /// `""` or `"all"` applies to every client type.
    #[serde(default)]
    pub client_type: String,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: CooldownReason,
}

impl Cooldown {
    /// Whether this cooldown applies to every client type.
    pub fn is_wildcard(&self) -> bool {
        self.client_type.is_empty() || self.client_type == "all"
    }
}

// ── Pagination ───────────────────────────────────────────────────────

/// Cursor pagination parameters for request listings.
///
/// A page without `before` is the most recent window; only such pages
/// accept newly pushed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl PaginationParams {
    /// The filter implied by these parameters.
    pub fn filter(&self) -> RequestFilter {
        RequestFilter {
            provider_id: self.provider_id,
            status: self.status,
        }
    }
}

/// One cursor-bounded page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<u64>,
}

impl<T> Default for CursorPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            first_id: None,
            last_id: None,
        }
    }
}

/// Provider/status filter shared by list pages, infinite collections
/// and count queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &ProxyRequest) -> bool {
        self.provider_id.is_none_or(|p| p == request.provider_id)
            && self.status.is_none_or(|s| s == request.status)
    }
}
