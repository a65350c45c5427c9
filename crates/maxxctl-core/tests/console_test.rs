#![allow(clippy::unwrap_used)]
// Console integration tests: REST via wiremock, push via a local WebSocket.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use maxxctl_api::PushEvent;
use maxxctl_core::{
    ConnectionState, Console, ConsoleConfig, CooldownLookup, CoreError, ProxyRequest, QueryKey,
    Reconciler, ReconcilerConfig, RequestFilter, RequestStatus,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

fn config(url: &str) -> ConsoleConfig {
    let mut cfg = ConsoleConfig::new(Url::parse(url).unwrap());
    cfg.websocket_enabled = false;
    cfg.stale_time = Duration::from_secs(60);
    cfg
}

async fn setup() -> (MockServer, Console) {
    let server = MockServer::start().await;
    let console = Console::new(config(&server.uri())).unwrap();
    (server, console)
}

fn admin_path(suffix: &str) -> String {
    format!("/api/admin/{suffix}")
}

fn cooldown_json(provider_id: u64, secs: i64) -> serde_json::Value {
    json!({
        "providerID": provider_id,
        "providerName": "primary",
        "clientType": "",
        "until": (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339(),
        "reason": "rate_limit_exceeded",
    })
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_reads_hit_server_once() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("requests/count")))
        .and(query_param("providerId", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 41 })))
        .expect(1)
        .mount(&server)
        .await;

    let filter = RequestFilter {
        provider_id: Some(2),
        status: None,
    };
    let first = console.requests_count(filter).await.unwrap();
    let second = console.requests_count(filter).await.unwrap();

    assert_eq!(first.data().unwrap().as_count(), Some(41));
    assert_eq!(second.data().unwrap().as_count(), Some(41));
    assert_eq!(console.cache().observer_count(first.key()), 2);
}

#[tokio::test]
async fn test_fetch_error_is_recorded_in_entry() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("dashboard")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .mount(&server)
        .await;

    let result = console.dashboard().await;
    assert!(
        matches!(&result, Err(CoreError::Api { status: Some(500), message }) if message == "db down"),
        "expected Api error, got: {:?}",
        result.err()
    );

    let state = console.cache().state(&QueryKey::dashboard()).unwrap();
    assert!(state.data.is_none());
    assert!(!state.is_fetching());
    assert!(state.error.unwrap().contains("db down"));
}

#[tokio::test]
async fn test_infinite_load_more_appends_older_page() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("requests")))
        .and(query_param("before", "8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": 7, "status": "COMPLETED" }],
            "hasMore": false,
            "firstId": 7,
            "lastId": 7,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("requests")))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": 9, "status": "IN_PROGRESS" },
                { "id": 8, "status": "COMPLETED" },
            ],
            "hasMore": true,
            "firstId": 9,
            "lastId": 8,
        })))
        .mount(&server)
        .await;

    let filter = RequestFilter::default();
    let observer = console.requests_infinite(filter, Some(2)).await.unwrap();
    assert!(console.load_more(filter).await.unwrap());
    assert!(!console.load_more(filter).await.unwrap());

    let data = observer.data().unwrap();
    let pages = data.as_pages().unwrap();
    assert_eq!(pages.pages.len(), 2);
    assert_eq!(pages.items().map(|r| r.id).collect::<Vec<_>>(), vec![9, 8, 7]);
    assert_eq!(pages.page_limit, Some(2));
}

#[tokio::test]
async fn test_load_more_keeps_updates_merged_during_fetch() {
    let (server, console) = setup().await;

    let older = |items: serde_json::Value, first: u64, last: u64| {
        ResponseTemplate::new(200).set_body_json(json!({
            "items": items,
            "hasMore": false,
            "firstId": first,
            "lastId": last,
        }))
    };
    Mock::given(method("GET"))
        .and(path(admin_path("requests")))
        .and(query_param("before", "8"))
        .respond_with(
            older(json!([{ "id": 7, "status": "COMPLETED" }]), 7, 7)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("requests")))
        .and(query_param("before", "9"))
        .respond_with(older(
            json!([
                { "id": 8, "status": "COMPLETED" },
                { "id": 7, "status": "COMPLETED" },
            ]),
            8,
            7,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("requests")))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": 9, "status": "IN_PROGRESS" },
                { "id": 8, "status": "COMPLETED" },
            ],
            "hasMore": true,
            "firstId": 9,
            "lastId": 8,
        })))
        .mount(&server)
        .await;

    let filter = RequestFilter::default();
    let observer = console.requests_infinite(filter, Some(2)).await.unwrap();

    let loader = {
        let console = console.clone();
        tokio::spawn(async move { console.load_more(filter).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut reconciler = Reconciler::new(Arc::clone(console.cache()), ReconcilerConfig::default());
    for (id, status) in [(10, RequestStatus::Pending), (9, RequestStatus::Completed)] {
        reconciler.handle_event(&PushEvent::RequestUpdate(ProxyRequest {
            id,
            status,
            start_time: Some(Utc::now()),
            ..ProxyRequest::default()
        }));
    }
    reconciler.flush(Utc::now());

    assert!(loader.await.unwrap().unwrap());

    let data = observer.data().unwrap();
    let items: Vec<_> = data
        .as_pages()
        .unwrap()
        .items()
        .map(|r| (r.id, r.status))
        .collect();
    assert_eq!(
        items,
        vec![
            (10, RequestStatus::Pending),
            (9, RequestStatus::Completed),
            (8, RequestStatus::Completed),
            (7, RequestStatus::Completed),
        ]
    );
    assert!(!observer.state().is_fetching());
}

// ── Cooldowns ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_cooldown_lookup_not_ready_until_loaded() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("cooldowns")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            cooldown_json(1, -30),
            cooldown_json(1, 3_700),
        ])))
        .mount(&server)
        .await;

    let now = Utc::now();
    assert_eq!(console.cooldown().lookup(1, None, now), CooldownLookup::NotReady);
    assert!(matches!(
        console.cooldown().cooldown_for_provider(1, None, now),
        Err(CoreError::NotReady { .. })
    ));

    let _observer = console.cooldowns().await.unwrap();
    let now = Utc::now();
    assert!(console.cooldown().lookup(1, None, now).is_active());
    assert_eq!(console.cooldown().lookup(2, None, now), CooldownLookup::Inactive);

    let view = console
        .cooldown()
        .cooldown_for_provider(1, Some("claude"), now)
        .unwrap()
        .unwrap();
    assert!(view.remaining.starts_with("01h 01m"), "got {}", view.remaining);
    assert_eq!(console.cooldown().active(now).unwrap().len(), 1);
}

#[tokio::test]
async fn test_clear_cooldown_invalidates_only_on_success() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("cooldowns")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cooldown_json(1, 60)])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(admin_path("cooldowns/1")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(admin_path("cooldowns/2")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "no such provider" })))
        .mount(&server)
        .await;

    let _observer = console.cooldowns().await.unwrap();

    let failed = console.clear_cooldown(2).await;
    assert!(matches!(failed, Err(CoreError::Rejected { .. })));
    assert!(!console.cache().state(&QueryKey::cooldowns()).unwrap().stale);

    console.clear_cooldown(1).await.unwrap();
    assert!(console.cache().state(&QueryKey::cooldowns()).unwrap().stale);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_setting_update_refetches_observed_settings() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("settings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "theme": "dark" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("settings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "theme": "light" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(admin_path("settings/theme")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    console.connect().await.unwrap();
    let mut observer = console.settings().await.unwrap();
    assert_eq!(
        observer.data().unwrap().as_settings().unwrap().get("theme").map(String::as_str),
        Some("dark")
    );

    console.update_setting("theme", "light").await.unwrap();

    let state = tokio::time::timeout(
        WAIT,
        observer.wait_for(|s| {
            !s.stale
                && s.data
                    .as_ref()
                    .and_then(|d| d.as_settings())
                    .and_then(|m| m.get("theme"))
                    .is_some_and(|v| v == "light")
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(state.error.is_none());

    console.disconnect().await;
}

#[tokio::test]
async fn test_connect_is_idempotent_and_disconnect_resets_state() {
    let (_server, console) = setup().await;
    let state = console.connection_state();

    console.connect().await.unwrap();
    console.connect().await.unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Connected);
    assert!(console.in_flight().await.is_some());

    console.disconnect().await;
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    assert!(console.in_flight().await.is_none());
}

#[tokio::test]
async fn test_dropping_connected_console_stops_background_refetch() {
    let (server, console) = setup().await;

    Mock::given(method("GET"))
        .and(path(admin_path("settings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "theme": "dark" })))
        .expect(1)
        .mount(&server)
        .await;

    console.connect().await.unwrap();
    let observer = console.settings().await.unwrap();
    let key = observer.key().clone();
    let cache = Arc::clone(console.cache());

    drop(console);
    tokio::time::sleep(Duration::from_millis(50)).await;

    cache.invalidate(&key);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(cache.state(&key).unwrap().stale);
    drop(observer);
}

#[tokio::test]
async fn test_oneshot_returns_closure_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(admin_path("settings/theme")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "dark" })))
        .mount(&server)
        .await;

    let value = Console::oneshot(config(&server.uri()), |console| async move {
        let observer = console.setting("theme").await?;
        Ok(observer.data().and_then(|d| d.as_setting().map(String::from)))
    })
    .await
    .unwrap();
    assert_eq!(value.as_deref(), Some("dark"));
}

// ── Push ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_push_updates_reach_observed_detail() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in [
            r#"{"type":"proxy_request_update","data":{"id":5,"status":"PENDING","providerID":1}}"#,
            r#"{"type":"proxy_request_update","data":{"id":5,"status":"COMPLETED","providerID":1}}"#,
            r#"{"type":"proxy_request_update","data":{"id":6,"status":"PENDING","providerID":1}}"#,
        ] {
            ws.send(Message::text(frame)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let mut cfg = config(&format!("http://{addr}"));
    cfg.websocket_enabled = true;
    let console = Console::new(cfg).unwrap();
    let mut state = console.connection_state();

    // Observe without fetching; only the push stream fills this entry.
    let mut detail = console.cache().observe(QueryKey::request_detail(5));
    let unobserved = QueryKey::request_detail(6);

    console.connect().await.unwrap();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let completed = |s: &maxxctl_core::QueryState| {
        s.data
            .as_ref()
            .and_then(|d| d.as_request())
            .is_some_and(|r| r.status == RequestStatus::Completed)
    };
    tokio::time::timeout(WAIT, detail.wait_for(completed))
        .await
        .unwrap()
        .unwrap();
    assert!(console.cache().get(&unobserved).is_none());

    console.disconnect().await;
    assert_eq!(
        *console.connection_state().borrow(),
        ConnectionState::Disconnected
    );
}
