//! Integration tests for the request gateway and single-flight renewal
//!
//! Runs the real HTTP stack against a wiremock server and checks how
//! concurrent 401s, rejected renewals and transient renewal failures play out.

mod support;

use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use support::{stale_session, TestStack};
use warehouse_infra::api::{ApiErrorCategory, SessionEvent, SignOutReason};
use warehouse_infra::ApiError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_bearer_gate(stack: &TestStack, rejected: &str, accepted: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .and(header("authorization", format!("Bearer {rejected}").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })))
        .mount(&stack.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .and(header("authorization", format!("Bearer {accepted}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&stack.server)
        .await;
}

/// Validates that concurrent 401s share one renewal.
///
/// # Test Steps
/// 1. Seed a session whose bearer the server rejects
/// 2. Delay the renewal answer so every caller observes it in flight
/// 3. Issue eight concurrent calls through the gateway
/// 4. Verify all calls succeed with the renewed bearer
/// 5. Confirm the renewal endpoint was hit exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unauthorized_calls_share_one_renewal() {
    let stack = TestStack::start(Some(stale_session())).await;
    mount_bearer_gate(&stack, "stale", "fresh", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .and(body_json(json!({"refresh": "refresh-1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "fresh"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&stack.server)
        .await;

    let calls = (0..8).map(|_| stack.gateway.get_json::<Value>("/companies/"));
    let outcomes = join_all(calls).await;

    for outcome in outcomes {
        assert_eq!(outcome.expect("call should succeed after renewal"), json!([]));
    }
    assert_eq!(stack.refresher.renewals_started(), 1);
    assert!(!stack.refresher.is_in_flight());
    assert_eq!(stack.session.bearer().as_deref(), Some("fresh"));
    assert_eq!(stack.session.renewal_credential().as_deref(), Some("refresh-1"));
}

/// Validates sign-out when the renewal credential is refused.
///
/// # Test Steps
/// 1. Seed a stale session and subscribe to session events
/// 2. Answer the renewal endpoint with 401
/// 3. Issue two concurrent calls
/// 4. Verify both callers receive the same renewal-rejected error
/// 5. Confirm the session is cleared and one SignedOut event is emitted
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_renewal_signs_out_once() {
    let stack = TestStack::start(Some(stale_session())).await;
    let mut events = stack.session.subscribe();
    mount_bearer_gate(&stack, "stale", "never", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Token is invalid or expired"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&stack.server)
        .await;

    let (first, second) = tokio::join!(
        stack.gateway.get_json::<Value>("/companies/"),
        stack.gateway.get_json::<Value>("/companies/"),
    );

    let first = first.unwrap_err();
    assert_eq!(first.category(), ApiErrorCategory::RenewalRejected);
    assert_eq!(Err::<Value, ApiError>(first), second);

    assert!(!stack.session.is_authenticated());
    assert_eq!(
        events.try_recv().expect("sign-out event"),
        SessionEvent::SignedOut { reason: SignOutReason::RenewalRejected }
    );
    assert!(events.try_recv().is_err(), "sign-out should be announced once");
}

/// Validates that a transient renewal failure keeps the session.
///
/// # Test Steps
/// 1. Answer the first renewal with 503 and later ones with a new bearer
/// 2. Issue a call and verify it fails as a transient renewal failure
/// 3. Confirm the session survives
/// 4. Issue a second call and verify a fresh renewal succeeds
#[tokio::test]
async fn test_transient_renewal_failure_allows_new_renewal() {
    let stack = TestStack::start(Some(stale_session())).await;
    mount_bearer_gate(&stack, "stale", "fresh", json!([{"id": 1, "name": "Acme"}])).await;

    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .up_to_n_times(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
        .mount(&stack.server)
        .await;

    let err = stack.gateway.get_json::<Value>("/companies/").await.unwrap_err();
    assert_eq!(err.category(), ApiErrorCategory::RenewalTransient);
    assert_eq!(err.status(), Some(503));
    assert!(stack.session.is_authenticated(), "transient failure must not sign out");

    let companies = stack.gateway.get_json::<Value>("/companies/").await.unwrap();
    assert_eq!(companies[0]["name"], "Acme");
    assert_eq!(stack.refresher.renewals_started(), 2);
}

/// Validates the single retry per call.
///
/// # Test Steps
/// 1. Reject every bearer on the protected endpoint
/// 2. Let the renewal succeed
/// 3. Verify the call fails with the second 401
/// 4. Confirm the endpoint saw exactly two attempts
#[tokio::test]
async fn test_second_unauthorized_is_returned_without_another_renewal() {
    let stack = TestStack::start(Some(stale_session())).await;

    Mock::given(method("GET"))
        .and(path("/companies/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "nope"})))
        .expect(2)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
        .expect(1)
        .mount(&stack.server)
        .await;

    let err = stack.gateway.get_json::<Value>("/companies/").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(stack.session.is_authenticated());
}

/// Validates the full flow from login to a renewed, cached read.
///
/// # Test Steps
/// 1. Log in and receive a bearer the resource endpoint will reject
/// 2. Rotate both credentials through the renewal endpoint
/// 3. Read companies twice through the command layer
/// 4. Verify the second read is served from the cache
/// 5. Confirm the rotated renewal credential is stored
#[tokio::test]
async fn test_login_renew_and_cached_read() {
    let stack = TestStack::start(None).await;
    let mut events = stack.session.subscribe();

    Mock::given(method("POST"))
        .and(path("/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "username": "olga",
            "groups": ["operator"]
        })))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "name": "Acme"}])),
        )
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a2",
            "refresh": "r2"
        })))
        .expect(1)
        .mount(&stack.server)
        .await;

    let session = stack.session.login("olga", "secret").await.unwrap();
    assert!(session.can_edit());

    let first = stack.api.companies().await.unwrap();
    let second = stack.api.companies().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].id, 7);

    assert_eq!(stack.session.renewal_credential().as_deref(), Some("r2"));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::SignedIn { username: "olga".to_string() }
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Renewed);
}

/// Validates that a call without a session never reaches renewal.
///
/// # Test Steps
/// 1. Start signed out
/// 2. Answer the protected endpoint with 401
/// 3. Verify the 401 is returned and no renewal was attempted
#[tokio::test]
async fn test_unauthorized_without_session_is_returned() {
    let stack = TestStack::start(None).await;

    Mock::given(method("GET"))
        .and(path("/companies/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "x"})))
        .expect(0)
        .mount(&stack.server)
        .await;

    let err = stack.gateway.get_json::<Value>("/companies/").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(stack.refresher.renewals_started(), 0);
}
