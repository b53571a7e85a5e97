//! End-to-end refresh-flow tests against a mock HTTP server.
//!
//! Exercises the full interceptor pipeline: credential attachment, the
//! single-flight renewal with bounded retries, queued concurrent requests,
//! and the single retry after an upstream auth rejection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authflight::{ApiRequest, AuthClient, AuthConfig, Error};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a compact JWT whose `exp` claim is `offset_secs` from now.
fn make_jwt(offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// Config pointing at the mock server, with fast backoff for test speed.
fn test_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        base_url: format!("{}/", server.uri()),
        backoff_base: Duration::from_millis(5),
        ..AuthConfig::default()
    }
}

fn refresh_body(token: &str) -> serde_json::Value {
    serde_json::json!({ "access": token })
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// A request with a valid, unexpired credential never touches the renewal
/// endpoint.
#[tokio::test]
async fn test_valid_credential_never_triggers_renewal() {
    let server = MockServer::start().await;
    let token = make_jwt(3600);

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", format!("Bearer {token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(token.clone())
        .build()
        .unwrap();

    let body: serde_json::Value = client.get("profile").await.unwrap();
    assert_eq!(body["ok"], true);
}

/// An expired stored credential triggers one renewal (succeeding on the
/// second attempt), and five concurrently queued requests all proceed with
/// the new token.
#[tokio::test]
async fn test_expired_credential_queues_concurrent_requests_behind_one_renewal() {
    let server = MockServer::start().await;
    let fresh = make_jwt(3600);

    // First renewal attempt fails transiently, second succeeds.
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body(&fresh))
                .set_delay(Duration::from_millis(30)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", format!("Bearer {fresh}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(5)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(make_jwt(-60))
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.dispatch(ApiRequest::get("things")).await
        }));
        // Queue each request behind the in-flight renewal before the next.
        tokio::task::yield_now().await;
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert!(response.is_success());
    }
}

/// A permanently failing renewal endpoint is tried exactly `max_retries`
/// times; every queued caller fails with `RenewalExhausted` and the
/// invalidation hook fires once.
#[tokio::test]
async fn test_exhausted_renewal_rejects_all_queued_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let invalidated = Arc::new(AtomicU32::new(0));
    let hook_count = invalidated.clone();
    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(make_jwt(-60))
        .on_invalidated(Arc::new(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.dispatch(ApiRequest::get("things")).await
        }));
        tokio::task::yield_now().await;
    }

    for handle in handles {
        let error = handle.await.unwrap().unwrap_err();
        assert!(
            matches!(error, Error::RenewalExhausted { attempts: 3, .. }),
            "unexpected error: {error}"
        );
    }
    assert_eq!(invalidated.load(Ordering::SeqCst), 1);
}

/// A 401 mid-flight on a seemingly valid credential forces a renewal and a
/// single replay; the caller sees only the final success.
#[tokio::test]
async fn test_stale_credential_is_renewed_and_request_replayed() {
    let server = MockServer::start().await;
    let stale = make_jwt(3600);
    let fresh = make_jwt(7200);

    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", format!("Bearer {stale}")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", format!("Bearer {fresh}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&fresh)))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(stale.clone())
        .build()
        .unwrap();

    let body: serde_json::Value = client.get("things").await.unwrap();
    assert_eq!(body["ok"], true);
}

/// Two consecutive auth rejections fail after exactly one retry.
#[tokio::test]
async fn test_second_auth_rejection_is_terminal() {
    let server = MockServer::start().await;
    let fresh = make_jwt(3600);

    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&fresh)))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(make_jwt(3600))
        .build()
        .unwrap();

    let error = client
        .dispatch(ApiRequest::get("things"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UpstreamAuthFailure(_)));
}

/// A 4xx from the renewal endpoint is terminal after a single attempt; no
/// retries are spent on a rejected refresh credential.
#[tokio::test]
async fn test_rejected_renewal_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid refresh token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(make_jwt(-60))
        .build()
        .unwrap();

    let error = client
        .dispatch(ApiRequest::get("things"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::RenewalRejected(_)));
}

/// The new credential written by a renewal round is observed by later
/// dispatches without another renewal.
#[tokio::test]
async fn test_renewed_credential_is_reused_by_later_requests() {
    let server = MockServer::start().await;
    let fresh = make_jwt(3600);

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&fresh)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", format!("Bearer {fresh}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;

    let client = AuthClient::builder()
        .config(test_config(&server))
        .credential(make_jwt(-60))
        .build()
        .unwrap();

    let first = client.dispatch(ApiRequest::get("things")).await.unwrap();
    assert!(first.is_success());

    let second = client.dispatch(ApiRequest::get("things")).await.unwrap();
    assert!(second.is_success());
}
