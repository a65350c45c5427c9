// ── Runtime connection configuration ──
//
// These types describe how to reach a maxx server and how the reactive
// layer is tuned. They never touch disk: the CLI builds a `ConsoleConfig`
// and hands it in.

use std::time::Duration;

use maxxctl_api::ReconnectConfig;
use maxxctl_api::transport::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one admin console session.
///
/// Built by the CLI from a config profile and passed to
/// [`Console`](crate::Console); core never reads config files.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Server URL (e.g. `http://localhost:9880`).
    pub url: Url,
    /// Admin token, sent as a bearer token on REST and WebSocket requests.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Open the push stream on connect.
    pub websocket_enabled: bool,
    pub reconnect: ReconnectConfig,
    /// Delay between the first unflushed request update and its flush.
    pub flush_interval: Duration,
    /// How old a `PENDING` request's start time may be and still count
    /// as newly created.
    pub new_request_window: Duration,
    /// Default staleness window for query reads. Zero means every read
    /// refetches.
    pub stale_time: Duration,
    /// Staleness window for the cooldown list.
    pub cooldown_stale_time: Duration,
    /// Unobserved entries older than this are dropped by the GC task.
    pub cache_time: Duration,
}

impl ConsoleConfig {
    /// Defaults for the server at `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            websocket_enabled: true,
            reconnect: ReconnectConfig::default(),
            flush_interval: Duration::from_millis(250),
            new_request_window: Duration::from_secs(15),
            stale_time: Duration::ZERO,
            cooldown_stale_time: Duration::from_secs(5),
            cache_time: Duration::from_secs(300),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
