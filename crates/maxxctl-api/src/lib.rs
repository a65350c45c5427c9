// maxxctl-api: Async Rust client for the maxx proxy admin API (REST + push stream)

pub mod client;
pub mod cooldowns;
pub mod error;
pub mod models;
pub mod push;
pub mod requests;
pub mod settings;
pub mod transport;

pub use client::AdminClient;
pub use error::Error;
pub use models::{
    Cooldown, CooldownReason, CursorPage, PaginationParams, ProxyRequest, ProxyUpstreamAttempt,
    RequestFilter, RequestStatus,
};
pub use push::{ConnectionState, PushEvent, PushHandle, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
