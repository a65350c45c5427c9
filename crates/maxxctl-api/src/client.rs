// Admin API HTTP client
//
// Wraps `reqwest::Client` with maxx-specific URL construction and status
// mapping. Endpoint groups (requests, cooldowns, settings) are inherent
// methods in sibling modules so this file stays about transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest body excerpt carried into error messages.
const PREVIEW_LEN: usize = 200;

/// `{"error": "..."}` body the admin handlers write on failure.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Raw HTTP client for the maxx admin API (`{base}/api/admin/...`).
///
/// Every method returns the decoded payload; non-2xx responses become
/// typed [`Error`] variants before the caller sees them.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AdminClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:9880`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// WebSocket URL of the push stream: `ws(s)://{host}/ws`.
    pub fn push_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join("/ws")?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive ws URL from {url}")))?;
        Ok(url)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/admin/{path}`
    pub(crate) fn admin_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/api/admin/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_json(resp).await
    }

    /// GET with query parameters serialized from `query`.
    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).query(query).send().await?;
        parse_json(resp).await
    }

    /// DELETE, discarding any response body.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let resp = self.http.delete(url).send().await?;
        check_status(resp).await.map(drop)
    }

    /// PUT, discarding any response body.
    pub(crate) async fn put_unit(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<(), Error> {
        debug!("PUT {}", url);
        let resp = self.http.put(url).json(body).send().await?;
        check_status(resp).await.map(drop)
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Map non-success statuses to typed errors, passing successes through.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let path = resp.url().path().to_owned();
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body);

    Err(match status {
        reqwest::StatusCode::UNAUTHORIZED => Error::Authentication {
            message: if message.is_empty() {
                "admin token missing or rejected".into()
            } else {
                message
            },
        },
        reqwest::StatusCode::NOT_FOUND => Error::NotFound { path },
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    let body = resp.text().await?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

/// Prefer the server's `{"error": ...}` message, fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| preview(body).trim().to_owned())
}

/// At most `PREVIEW_LEN` bytes of `body`, cut on a char boundary.
fn preview(body: &str) -> &str {
    if body.len() <= PREVIEW_LEN {
        return body;
    }
    let mut end = PREVIEW_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> AdminClient {
        AdminClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn admin_url_joins_paths() {
        let c = client("http://localhost:9880/");
        assert_eq!(
            c.admin_url("requests/42").unwrap().as_str(),
            "http://localhost:9880/api/admin/requests/42"
        );
        assert_eq!(
            c.admin_url("/cooldowns").unwrap().as_str(),
            "http://localhost:9880/api/admin/cooldowns"
        );
    }

    #[test]
    fn push_url_follows_scheme() {
        assert_eq!(
            client("http://localhost:9880").push_url().unwrap().as_str(),
            "ws://localhost:9880/ws"
        );
        assert_eq!(
            client("https://maxx.example.com").push_url().unwrap().as_str(),
            "wss://maxx.example.com/ws"
        );
    }

    #[test]
    fn error_message_prefers_json_field() {
        assert_eq!(error_message(r#"{"error":"invalid provider"}"#), "invalid provider");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let cut = preview(&body);
        assert!(cut.len() <= PREVIEW_LEN);
        assert!(body.starts_with(cut));
    }
}
