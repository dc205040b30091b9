//! Token refresh through the request pipeline

mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use steadfast_core::testing::MockTokenRefresher;
use steadfast_core::{CredentialStore, RefreshFailure};
use steadfast_domain::{ApiError, ErrorKind, HttpMethod, RequestEnvelope, SessionEvent, TokenPair};
use support::{bearer, fast_config, harness, ACCESS, REFRESH};
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_protected(server: &MockServer, valid_token: &str) {
    Mock::given(method("GET"))
        .and(path_regex("^/data/"))
        .and(header("authorization", bearer(valid_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/data/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_unauthorized_responses_trigger_one_refresh() {
    let server = MockServer::start().await;
    mount_protected(&server, "access-2").await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refresh_token": REFRESH})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "access-2", "refresh_token": "refresh-2"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(fast_config(&server.uri()), None).await;
    let mut events = h.pipeline.session_events();

    let calls = (0..6).map(|i| {
        let pipeline = h.pipeline.clone();
        async move { pipeline.get::<Value>(&format!("/data/{i}")).await }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(h.pipeline.refresh_calls(), 1);
    assert_eq!(h.store.access_token().await.unwrap().as_deref(), Some("access-2"));
    assert_eq!(h.store.refresh_token().await.unwrap().as_deref(), Some("refresh-2"));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
}

#[tokio::test]
async fn test_late_unauthorized_after_rotation_reuses_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/slow"))
        .and(header("authorization", bearer(ACCESS).as_str()))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(150)))
        .with_priority(2)
        .mount(&server)
        .await;
    mount_protected(&server, "access-2").await;
    let refresher =
        Arc::new(MockTokenRefresher::succeeding(TokenPair::new("access-2", "refresh-2")));
    let h = harness(fast_config(&server.uri()), Some(refresher.clone())).await;

    // the slow 401 arrives after the fast one already rotated the tokens
    let (slow, fast) = futures::join!(
        h.pipeline.get::<Value>("/data/slow"),
        h.pipeline.get::<Value>("/data/fast")
    );

    assert!(slow.is_ok());
    assert!(fast.is_ok());
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;
    mount_protected(&server, "never-issued").await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(fast_config(&server.uri()), None).await;
    let mut events = h.pipeline.session_events();

    let _: Value = h.pipeline.get("/me").await.unwrap();
    assert_eq!(h.pipeline.cached_responses(), 1);

    let outcome = h.pipeline.execute(RequestEnvelope::get("/data/x")).await;

    assert_eq!(outcome.unwrap_err().kind(), ErrorKind::AuthFailed);
    assert!(h.store.snapshot().is_empty());
    assert_eq!(h.pipeline.cached_responses(), 0);
    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Expired { .. }));
}

#[tokio::test]
async fn test_refresh_outage_keeps_tokens() {
    let server = MockServer::start().await;
    mount_protected(&server, "never-issued").await;
    let refresher = Arc::new(MockTokenRefresher::failing(RefreshFailure::Unavailable(
        ApiError::http(503, "down"),
    )));
    let h = harness(fast_config(&server.uri()), Some(refresher)).await;

    let outcome = h.pipeline.execute(RequestEnvelope::get("/data/x")).await;

    assert_eq!(outcome.unwrap_err().status(), Some(503));
    assert_eq!(h.store.access_token().await.unwrap().as_deref(), Some(ACCESS));
}

#[tokio::test]
async fn test_second_unauthorized_is_surfaced() {
    let server = MockServer::start().await;
    mount_protected(&server, "never-issued").await;
    let refresher =
        Arc::new(MockTokenRefresher::succeeding(TokenPair::new("access-2", "refresh-2")));
    let h = harness(fast_config(&server.uri()), Some(refresher.clone())).await;

    let outcome = h.pipeline.execute(RequestEnvelope::get("/data/x")).await;

    assert_eq!(outcome.unwrap_err().status(), Some(401));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 2);
}

#[tokio::test]
async fn test_auth_endpoints_do_not_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let refresher = Arc::new(MockTokenRefresher::succeeding(TokenPair::new("x", "y")));
    let h = harness(fast_config(&server.uri()), Some(refresher.clone())).await;

    let envelope =
        RequestEnvelope::new(HttpMethod::Post, "/auth/login").with_body(json!({"user": "ada"}));
    let outcome = h.pipeline.execute(envelope).await;

    assert_eq!(outcome.unwrap_err().status(), Some(401));
    assert_eq!(refresher.calls(), 0);
}
