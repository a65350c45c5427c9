//! WebSocket push stream with auto-reconnect.
//!
//! Connects to the server's `/ws` endpoint, validates each `{type, data}`
//! frame into a typed [`PushEvent`], and fans events out through a
//! [`tokio::sync::broadcast`] channel. Reconnects with exponential backoff
//! and publishes [`ConnectionState`] transitions on a `watch` channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use maxxctl_api::push::{PushHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let handle = PushHandle::connect(ws_url, ReconnectConfig::default(), CancellationToken::new(), None);
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{ProxyRequest, ProxyUpstreamAttempt};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

const TYPE_REQUEST_UPDATE: &str = "proxy_request_update";
const TYPE_ATTEMPT_UPDATE: &str = "proxy_upstream_attempt_update";
const TYPE_COOLDOWN_UPDATE: &str = "cooldown_update";

// ── PushEvent ────────────────────────────────────────────────────────

/// A validated event from the push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A request was created or changed state.
    RequestUpdate(ProxyRequest),
    /// An upstream attempt was created or changed state.
    AttemptUpdate(ProxyUpstreamAttempt),
    /// Some provider's cooldown changed; the payload is not used.
    CooldownUpdate,
}

/// Raw frame shape: `{"type": "...", "data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse and validate one text frame.
///
/// Returns `Ok(None)` for frame types this client does not consume (log
/// lines, other broadcasts). Payloads that do not carry a usable identity
/// are rejected so they never reach a cache.
pub fn parse_frame(text: &str) -> Result<Option<PushEvent>, Error> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| Error::InvalidPayload {
        event: "envelope".into(),
        reason: e.to_string(),
    })?;

    let event = match envelope.kind.as_str() {
        TYPE_REQUEST_UPDATE => {
            let request: ProxyRequest = decode(&envelope.kind, envelope.data)?;
            if request.id == 0 {
                return Err(invalid(&envelope.kind, "id must be non-zero"));
            }
            PushEvent::RequestUpdate(request)
        }
        TYPE_ATTEMPT_UPDATE => {
            let attempt: ProxyUpstreamAttempt = decode(&envelope.kind, envelope.data)?;
            if attempt.id == 0 {
                return Err(invalid(&envelope.kind, "id must be non-zero"));
            }
            if attempt.proxy_request_id == 0 {
                return Err(invalid(&envelope.kind, "proxyRequestID must be non-zero"));
            }
            PushEvent::AttemptUpdate(attempt)
        }
        TYPE_COOLDOWN_UPDATE => PushEvent::CooldownUpdate,
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| invalid(kind, &e.to_string()))
}

fn invalid(kind: &str, reason: &str) -> Error {
    Error::InvalidPayload {
        event: kind.to_owned(),
        reason: reason.to_owned(),
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// Waiting to retry after a failure; `attempt` counts from 1.
    Reconnecting { attempt: u32 },
    Disconnected,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push stream.
///
/// Dropping a receiver from [`subscribe`](Self::subscribe) unsubscribes it.
/// Cancel the token (or call [`shutdown`](Self::shutdown)) to stop the
/// background task.
pub struct PushHandle {
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Spawn the reconnection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously. `bearer` is
    /// sent as the `Authorization` header of the upgrade request.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        bearer: Option<String>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let task = tokio::spawn(push_loop(
            ws_url,
            event_tx.clone(),
            state_tx,
            reconnect,
            cancel.clone(),
            bearer,
        ));

        Self {
            event_tx,
            state_rx,
            cancel,
            task,
        }
    }

    /// A new receiver for validated events.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_tx.subscribe()
    }

    /// Connection state updates.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Signal the background task to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop the background task and wait for it to exit.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "push task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// connect → read → on error, backoff → reconnect.
async fn push_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    state_tx: watch::Sender<ConnectionState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    bearer: Option<String>,
) {
    let mut attempt: u32 = 0;

    loop {
        state_tx.send_replace(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &event_tx, &state_tx, &cancel, bearer.as_deref()) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!("push stream closed cleanly, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "push stream error");

                if reconnect.max_retries.is_some_and(|max| attempt >= max) {
                    tracing::error!(
                        max_retries = ?reconnect.max_retries,
                        "push stream reconnection limit reached, giving up"
                    );
                    break;
                }

                let delay = calculate_backoff(attempt, &reconnect);
                attempt += 1;
                state_tx.send_replace(ConnectionState::Reconnecting { attempt });
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    tracing::debug!("push loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    state_tx: &watch::Sender<ConnectionState>,
    cancel: &CancellationToken,
    bearer: Option<&str>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to push stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = bearer {
        request = request.with_header("Authorization", value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("push stream connected");
    state_tx.send_replace(ConnectionState::Connected);

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_frame(text.as_str(), event_tx);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason.as_str(), "push stream close frame");
                        } else {
                            tracing::info!("push stream close frame (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("push stream ended");
                        return Ok(());
                    }
                    // Ping is answered by tungstenite; binary frames are not used.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Validate a frame and broadcast it; invalid or unknown frames stop here.
fn dispatch_frame(text: &str, event_tx: &broadcast::Sender<Arc<PushEvent>>) {
    match parse_frame(text) {
        Ok(Some(event)) => {
            // No receivers is fine: nobody is watching right now.
            let _ = event_tx.send(Arc::new(event));
        }
        Ok(None) => tracing::trace!("skipping push frame of unhandled type"),
        Err(e) => tracing::warn!(error = %e, "dropping invalid push payload"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `delay = min(initial * 2^attempt, max) * jitter`, jitter within ±25%.
///
/// Jitter is derived from the attempt number so it is reproducible.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_grows_then_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d0 = calculate_backoff(0, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d2 > d0, "d2 ({d2:?}) should exceed d0 ({d0:?})");

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "got {d10:?}");
        assert!(calculate_backoff(u32::MAX, &config) <= Duration::from_millis(12_500));
    }

    #[test]
    fn parses_request_update() {
        let frame = serde_json::json!({
            "type": "proxy_request_update",
            "data": { "id": 5, "status": "PENDING", "providerID": 2 }
        })
        .to_string();

        let Some(PushEvent::RequestUpdate(req)) = parse_frame(&frame).unwrap() else {
            panic!("expected a request update");
        };
        assert_eq!(req.id, 5);
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.provider_id, 2);
    }

    #[test]
    fn parses_attempt_update() {
        let frame = serde_json::json!({
            "type": "proxy_upstream_attempt_update",
            "data": { "id": 9, "proxyRequestID": 5, "status": "IN_PROGRESS" }
        })
        .to_string();

        let Some(PushEvent::AttemptUpdate(attempt)) = parse_frame(&frame).unwrap() else {
            panic!("expected an attempt update");
        };
        assert_eq!(attempt.id, 9);
        assert_eq!(attempt.proxy_request_id, 5);
    }

    #[test]
    fn cooldown_payload_is_ignored() {
        let frame = r#"{"type":"cooldown_update","data":{"anything":true}}"#;
        assert_eq!(parse_frame(frame).unwrap(), Some(PushEvent::CooldownUpdate));
        let frame = r#"{"type":"cooldown_update"}"#;
        assert_eq!(parse_frame(frame).unwrap(), Some(PushEvent::CooldownUpdate));
    }

    #[test]
    fn unknown_type_is_skipped() {
        let frame = r#"{"type":"log_message","data":"hello"}"#;
        assert_eq!(parse_frame(frame).unwrap(), None);
    }

    #[test]
    fn request_without_id_is_rejected() {
        let frame = r#"{"type":"proxy_request_update","data":{"status":"PENDING"}}"#;
        assert!(matches!(
            parse_frame(frame),
            Err(Error::InvalidPayload { .. })
        ));

        let frame = r#"{"type":"proxy_request_update","data":{"id":0}}"#;
        assert!(matches!(
            parse_frame(frame),
            Err(Error::InvalidPayload { .. })
        ));

        let frame = r#"{"type":"proxy_request_update","data":null}"#;
        assert!(parse_frame(frame).is_err());
    }

    #[test]
    fn attempt_without_parent_is_rejected() {
        let frame = r#"{"type":"proxy_upstream_attempt_update","data":{"id":3,"proxyRequestID":0}}"#;
        assert!(parse_frame(frame).is_err());
    }

    #[test]
    fn dispatch_drops_invalid_frames() {
        let (tx, mut rx) = broadcast::channel(16);

        dispatch_frame("not json at all", &tx);
        dispatch_frame(r#"{"type":"proxy_request_update","data":{}}"#, &tx);
        dispatch_frame(r#"{"type":"log_message","data":"x"}"#, &tx);
        assert!(rx.try_recv().is_err());

        dispatch_frame(r#"{"type":"cooldown_update","data":null}"#, &tx);
        assert_eq!(*rx.try_recv().unwrap(), PushEvent::CooldownUpdate);
    }
}
