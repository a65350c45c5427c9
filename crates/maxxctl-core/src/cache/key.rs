// ── Hierarchical query keys ──
//
// Keys are paths of parts so that invalidation can target a whole
// subtree (`requests/list/*`) with a single prefix.

use std::fmt;

use maxxctl_api::{PaginationParams, RequestFilter};

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Name(&'static str),
    Id(u64),
    Text(String),
    Page(PaginationParams),
    Filter(RequestFilter),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
            Self::Page(p) => {
                write!(f, "{{")?;
                let mut sep = "";
                if let Some(limit) = p.limit {
                    write!(f, "limit={limit}")?;
                    sep = ",";
                }
                if let Some(before) = p.before {
                    write!(f, "{sep}before={before}")?;
                    sep = ",";
                }
                write_filter(f, p.provider_id, p.status, sep)?;
                write!(f, "}}")
            }
            Self::Filter(flt) => {
                write!(f, "{{")?;
                write_filter(f, flt.provider_id, flt.status, "")?;
                write!(f, "}}")
            }
        }
    }
}

fn write_filter(
    f: &mut fmt::Formatter<'_>,
    provider_id: Option<u64>,
    status: Option<maxxctl_api::RequestStatus>,
    mut sep: &str,
) -> fmt::Result {
    if let Some(provider) = provider_id {
        write!(f, "{sep}provider={provider}")?;
        sep = ",";
    }
    if let Some(status) = status {
        write!(f, "{sep}status={status}")?;
    }
    Ok(())
}

const REQUESTS: &str = "requests";
const LIST: &str = "list";
const INFINITE: &str = "infinite";
const DETAIL: &str = "detail";
const ATTEMPTS: &str = "attempts";
const REQUESTS_COUNT: &str = "requestsCount";
const COOLDOWNS: &str = "cooldowns";
const DASHBOARD: &str = "dashboard";
const PROVIDER_STATS: &str = "providerStats";
const SETTINGS: &str = "settings";

/// What a key loads, used to refetch an entry from its key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget<'a> {
    List(&'a PaginationParams),
    Infinite(&'a RequestFilter),
    Detail(u64),
    Attempts(u64),
    Count(&'a RequestFilter),
    Cooldowns,
    Dashboard,
    ProviderStats,
    Settings,
    Setting(&'a str),
}

/// Identity of a cached query.
///
/// ```text
/// requests/list/{params}          one cursor page
/// requests/infinite/{filter}      an infinite collection of pages
/// requests/detail/{id}            one request
/// requests/detail/{id}/attempts   its upstream attempts
/// requestsCount/{filter}          filtered total
/// cooldowns | dashboard | providerStats | settings | settings/{key}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    fn of(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn requests() -> Self {
        Self::of(vec![KeyPart::Name(REQUESTS)])
    }

    pub fn request_lists() -> Self {
        Self::of(vec![KeyPart::Name(REQUESTS), KeyPart::Name(LIST)])
    }

    pub fn request_list(params: PaginationParams) -> Self {
        Self::of(vec![
            KeyPart::Name(REQUESTS),
            KeyPart::Name(LIST),
            KeyPart::Page(params),
        ])
    }

    pub fn request_infinites() -> Self {
        Self::of(vec![KeyPart::Name(REQUESTS), KeyPart::Name(INFINITE)])
    }

    pub fn request_infinite(filter: RequestFilter) -> Self {
        Self::of(vec![
            KeyPart::Name(REQUESTS),
            KeyPart::Name(INFINITE),
            KeyPart::Filter(filter),
        ])
    }

    pub fn request_detail(id: u64) -> Self {
        Self::of(vec![
            KeyPart::Name(REQUESTS),
            KeyPart::Name(DETAIL),
            KeyPart::Id(id),
        ])
    }

    pub fn request_attempts(id: u64) -> Self {
        Self::of(vec![
            KeyPart::Name(REQUESTS),
            KeyPart::Name(DETAIL),
            KeyPart::Id(id),
            KeyPart::Name(ATTEMPTS),
        ])
    }

    pub fn request_counts() -> Self {
        Self::of(vec![KeyPart::Name(REQUESTS_COUNT)])
    }

    pub fn request_count(filter: RequestFilter) -> Self {
        Self::of(vec![KeyPart::Name(REQUESTS_COUNT), KeyPart::Filter(filter)])
    }

    pub fn cooldowns() -> Self {
        Self::of(vec![KeyPart::Name(COOLDOWNS)])
    }

    pub fn dashboard() -> Self {
        Self::of(vec![KeyPart::Name(DASHBOARD)])
    }

    pub fn provider_stats() -> Self {
        Self::of(vec![KeyPart::Name(PROVIDER_STATS)])
    }

    pub fn settings() -> Self {
        Self::of(vec![KeyPart::Name(SETTINGS)])
    }

    pub fn setting(key: &str) -> Self {
        Self::of(vec![KeyPart::Name(SETTINGS), KeyPart::Text(key.to_owned())])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether `prefix` is an ancestor of (or equal to) this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The fetch this key stands for; `None` for prefixes.
    pub fn target(&self) -> Option<KeyTarget<'_>> {
        let target = match self.0.as_slice() {
            [KeyPart::Name(REQUESTS), KeyPart::Name(LIST), KeyPart::Page(p)] => KeyTarget::List(p),
            [KeyPart::Name(REQUESTS), KeyPart::Name(INFINITE), KeyPart::Filter(f)] => {
                KeyTarget::Infinite(f)
            }
            [KeyPart::Name(REQUESTS), KeyPart::Name(DETAIL), KeyPart::Id(id)] => KeyTarget::Detail(*id),
            [
                KeyPart::Name(REQUESTS),
                KeyPart::Name(DETAIL),
                KeyPart::Id(id),
                KeyPart::Name(ATTEMPTS),
            ] => KeyTarget::Attempts(*id),
            [KeyPart::Name(REQUESTS_COUNT), KeyPart::Filter(f)] => KeyTarget::Count(f),
            [KeyPart::Name(COOLDOWNS)] => KeyTarget::Cooldowns,
            [KeyPart::Name(DASHBOARD)] => KeyTarget::Dashboard,
            [KeyPart::Name(PROVIDER_STATS)] => KeyTarget::ProviderStats,
            [KeyPart::Name(SETTINGS)] => KeyTarget::Settings,
            [KeyPart::Name(SETTINGS), KeyPart::Text(key)] => KeyTarget::Setting(key),
            _ => return None,
        };
        Some(target)
    }

    /// Pagination parameters if this is a `requests/list/{params}` key.
    pub fn list_params(&self) -> Option<&PaginationParams> {
        match self.0.as_slice() {
            [KeyPart::Name(REQUESTS), KeyPart::Name(LIST), KeyPart::Page(p)] => Some(p),
            _ => None,
        }
    }

    /// Filter if this is a `requests/infinite/{filter}` key.
    pub fn infinite_filter(&self) -> Option<&RequestFilter> {
        match self.0.as_slice() {
            [KeyPart::Name(REQUESTS), KeyPart::Name(INFINITE), KeyPart::Filter(f)] => Some(f),
            _ => None,
        }
    }

    /// Filter if this is a `requestsCount/{filter}` key.
    pub fn count_filter(&self) -> Option<&RequestFilter> {
        match self.0.as_slice() {
            [KeyPart::Name(REQUESTS_COUNT), KeyPart::Filter(f)] => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for part in &self.0 {
            write!(f, "{sep}{part}")?;
            sep = "/";
        }
        Ok(())
    }
}
