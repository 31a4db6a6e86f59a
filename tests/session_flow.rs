use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use furo_auth::{
    AppState, Config, Error, FuroClient, KeyValueStore, LogoutOptions, MemoryLocation,
    MemoryStore, SessionController, SessionOptions, SessionStatus,
};
use serde_json::json;
use time::OffsetDateTime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Controller = SessionController<MemoryStore, MemoryLocation>;

fn controller(server: &MockServer, url: &str, local: MemoryStore, options: SessionOptions) -> Controller {
    let config = Config::new(
        "https://auth.furo.one".parse().unwrap(),
        "client-1",
        "https://app.example.com/home".parse().unwrap(),
    )
    .unwrap()
    .with_api_url(server.uri().parse().unwrap());
    let client = FuroClient::new(
        config,
        local,
        MemoryStore::new(),
        MemoryLocation::new(url.parse().unwrap()),
    );
    SessionController::new(Arc::new(client), options)
}

fn structured_token(exp: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig")
}

fn counting_callback() -> (SessionOptions, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let options = SessionOptions::new().with_on_redirect_callback(move |_: &AppState| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (options, calls)
}

#[tokio::test]
async fn test_mount_with_redirect_authenticates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer XYZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U1" })))
        .expect(1)
        .mount(&server)
        .await;

    let (options, calls) = counting_callback();
    let controller = controller(
        &server,
        "https://app.example.com/callback?code=XYZ&uid=U1",
        MemoryStore::new(),
        options,
    );

    assert_eq!(controller.initialize().await, SessionStatus::Authenticated);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let state = controller.state();
    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.user.unwrap().get_str("uid"), Some("U1"));
}

#[tokio::test]
async fn test_default_redirect_callback_cleans_url_and_navigates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U1" })))
        .mount(&server)
        .await;

    let controller = controller(
        &server,
        "https://app.example.com/callback?code=XYZ",
        MemoryStore::new(),
        SessionOptions::new(),
    );
    controller.initialize().await;

    let location = controller.client().location();
    assert_eq!(location.replacements(), vec!["/callback".to_string()]);
    assert_eq!(location.navigations(), vec!["https://app.example.com/home".to_string()]);
}

#[tokio::test]
async fn test_mount_with_redirect_and_rejected_user_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (options, calls) = counting_callback();
    let controller = controller(
        &server,
        "https://app.example.com/callback?code=XYZ&uid=U1",
        MemoryStore::new(),
        options,
    );

    assert_eq!(controller.initialize().await, SessionStatus::Unauthenticated);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.client().local_store().peek("furo-client-1-token"), None);
    assert_eq!(controller.client().local_store().peek("furo-token"), None);
}

#[tokio::test]
async fn test_mount_restores_stored_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U7" })))
        .expect(1)
        .mount(&server)
        .await;

    let (options, calls) = counting_callback();
    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([("furo-client-1-token", "stored")]),
        options,
    );

    assert_eq!(controller.initialize().await, SessionStatus::Authenticated);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mount_renews_once_after_failed_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "renewed" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U1" })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([
            ("furo-client-1-token", "stale"),
            ("furo-client-1-refresh-token", "rt-1"),
        ]),
        SessionOptions::new(),
    );

    assert_eq!(controller.initialize().await, SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_mount_errors_when_renewal_impossible() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([("furo-client-1-token", "stale")]),
        SessionOptions::new(),
    );

    assert_eq!(controller.initialize().await, SessionStatus::Errored);
    assert!(matches!(controller.state().error, Some(Error::LoginRequired)));
}

#[tokio::test]
async fn test_expired_access_token_refreshes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let expired = structured_token(OffsetDateTime::now_utc().unix_timestamp() - 10);
    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([
            ("furo-client-1-token", expired.as_str()),
            ("furo-client-1-refresh-token", "rt-1"),
        ]),
        SessionOptions::new(),
    );

    assert_eq!(controller.get_access_token_silently().await.unwrap(), "new-token");
}

#[tokio::test]
async fn test_valid_access_token_returned_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "unused" })))
        .expect(0)
        .mount(&server)
        .await;

    let valid = structured_token(OffsetDateTime::now_utc().unix_timestamp() + 3600);
    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([
            ("furo-client-1-token", valid.as_str()),
            ("furo-client-1-refresh-token", "rt-1"),
        ]),
        SessionOptions::new(),
    );

    assert_eq!(controller.get_access_token_silently().await.unwrap(), valid);
}

#[tokio::test]
async fn test_logout_clears_storage_and_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U1" })))
        .mount(&server)
        .await;

    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::with_entries([("furo-client-1-token", "t1"), ("furo-token", "t1")]),
        SessionOptions::new(),
    );
    controller.initialize().await;
    assert_eq!(controller.status(), SessionStatus::Authenticated);

    let client = controller.client();
    client.session_store().set("furo-client-1-token", "t1").await.unwrap();

    controller.logout(&LogoutOptions::new()).await.unwrap();

    let local = client.local_store();
    for key in ["furo-user", "furo-token", "furo-client-1-token"] {
        assert_eq!(local.peek(key), None, "{key} left behind");
    }
    assert_eq!(client.session_store().peek("furo-client-1-token"), None);

    let state = controller.state();
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
}

#[tokio::test]
async fn test_explicit_redirect_handling_publishes_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer LATE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "U9" })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::new(),
        SessionOptions::new(),
    );
    let mut rx = controller.subscribe();

    let result = controller
        .handle_redirect_callback(Some("?code=LATE&uid=U9"))
        .await
        .unwrap();

    assert_eq!(result.uid.as_deref(), Some("U9"));
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_explicit_redirect_failure_still_updates_state() {
    let server = MockServer::start().await;

    let controller = controller(
        &server,
        "https://app.example.com/",
        MemoryStore::new(),
        SessionOptions::new(),
    );
    let err = controller.handle_redirect_callback(Some("/")).await.unwrap_err();

    assert!(matches!(err, Error::MissingAuthParams));
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
}
