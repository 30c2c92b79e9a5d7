//! Integration tests for AppContext lifecycle
//!
//! Tests verify that AppContext wires the access layer correctly, restores
//! persisted sessions and shuts down cleanly.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use warehouse_app::context::AppContext;
use warehouse_domain::{ApiConfig, Config, SessionConfig};
use warehouse_infra::api::{MemorySessionStorage, SessionStorage};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, storage_path: Option<String>) -> Config {
    Config {
        api: ApiConfig { base_url: format!("{}/", server.uri()), timeout_seconds: 5 },
        session: SessionConfig { storage_path },
        ..Config::default()
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "username": "admin",
            "groups": ["admin"],
            "is_superuser": true
        })))
        .mount(server)
        .await;
}

/// Test that a context over a file slot restores the session on restart
///
/// This test verifies:
/// - Login persists the session to the configured file
/// - A second context built from the same config starts signed in
/// - Permission helpers survive the round trip
#[tokio::test]
async fn test_persisted_session_is_restored() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().expect("failed to create temporary test directory");
    let slot = dir.path().join("session.json").to_string_lossy().into_owned();

    let first = AppContext::new(config_for(&server, Some(slot.clone()))).expect("context");
    assert!(!first.session.is_authenticated());
    first.session.login("admin", "pw").await.expect("login");
    first.shutdown();
    drop(first);

    let second = AppContext::new(config_for(&server, Some(slot))).expect("context");
    assert!(second.session.is_authenticated());
    assert!(second.session.is_admin());
    assert_eq!(second.session.bearer().as_deref(), Some("a1"));
}

/// Test that the composed stack serves commands end to end
///
/// This test verifies:
/// - The trailing slash of the base URL is tolerated
/// - The bearer from the session reaches the server
/// - Cached reads are reported in the cache statistics
#[tokio::test]
async fn test_context_serves_cached_commands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/roles/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "operator"}])))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server).await;

    let storage: Arc<dyn SessionStorage> = Arc::new(MemorySessionStorage::new());
    let ctx = AppContext::with_storage(config_for(&server, None), storage).expect("context");
    ctx.session.login("admin", "pw").await.expect("login");

    let roles = ctx.api.roles().await.expect("roles");
    assert_eq!(roles.len(), 1);
    assert_eq!(ctx.api.roles().await.expect("cached roles"), roles);

    let report = ctx.cache_report();
    let (_, roles_stats) =
        report.iter().find(|(name, _)| *name == "roles").expect("roles cache reported");
    assert_eq!(roles_stats.misses, 1);
    assert_eq!(roles_stats.hits, 1);

    ctx.shutdown();
    assert_eq!(ctx.caches.roles.stats().size, 0);
    assert!(ctx.session.is_authenticated(), "shutdown keeps the session");
}

/// Test that an unusable configuration is rejected
#[test]
fn test_empty_base_url_is_rejected() {
    let config = Config {
        api: ApiConfig { base_url: "   ".into(), timeout_seconds: 5 },
        ..Config::default()
    };
    let err = AppContext::new(config).unwrap_err();
    assert!(matches!(err, warehouse_infra::ApiError::Config(_)));
}
