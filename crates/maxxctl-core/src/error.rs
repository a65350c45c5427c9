// ── Core error types ──
//
// User-facing errors from maxxctl-core. Consumers never see raw HTTP or
// JSON failures; `From<maxxctl_api::Error>` translates transport errors
// into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to maxx at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected to the push stream")]
    Disconnected,

    #[error("Request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {identifier}")]
    NotFound { identifier: String },

    /// A lookup ran before the data it depends on was first fetched.
    #[error("{what} not loaded yet")]
    NotReady { what: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by server: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a retry later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout | Self::Disconnected
        ) || matches!(self, Self::Api { status: Some(s), .. } if *s >= 500)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<maxxctl_api::Error> for CoreError {
    fn from(err: maxxctl_api::Error) -> Self {
        use maxxctl_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::NotFound { path } => CoreError::NotFound { identifier: path },
            ApiError::Api { status, message } if (400..500).contains(&status) => {
                CoreError::Rejected { message }
            }
            ApiError::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ApiError::InvalidPayload { event, reason } => CoreError::ValidationFailed {
                message: format!("{event}: {reason}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_become_rejections() {
        let err: CoreError = maxxctl_api::Error::Api {
            status: 422,
            message: "until must be in the future".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Rejected { ref message } if message.contains("future")));
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_stay_transient() {
        let err: CoreError = maxxctl_api::Error::Api {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn not_found_keeps_path() {
        let err: CoreError = maxxctl_api::Error::NotFound {
            path: "/api/admin/requests/9".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Not found: /api/admin/requests/9");
    }
}
