//! Shared fixtures for the access-layer integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use warehouse_domain::{CacheSettings, Identity, Session};
use warehouse_infra::api::{
    HttpAuthClient, HttpTransport, MemorySessionStorage, SessionStorage, SingleFlightRefresh,
    WarehouseCaches,
};
use warehouse_infra::{HttpClient, RequestGateway, SessionStore, WarehouseApi};
use wiremock::MockServer;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test writer once per binary.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warehouse_infra=debug")
            .with_test_writer()
            .try_init();
    });
}

/// A signed-in operator whose bearer credential the mock server rejects.
pub fn stale_session() -> Session {
    Session::new(
        "stale".to_string(),
        Some("refresh-1".to_string()),
        Identity { username: "olga".to_string(), ..Identity::default() },
        ["operator".to_string()],
        false,
    )
}

/// The full access layer wired against a mock server.
pub struct TestStack {
    pub server: MockServer,
    pub session: Arc<SessionStore>,
    pub refresher: Arc<SingleFlightRefresh>,
    pub gateway: Arc<RequestGateway>,
    pub api: WarehouseApi,
}

impl TestStack {
    /// Build a stack with an in-memory session slot holding `initial`.
    pub async fn start(initial: Option<Session>) -> Self {
        let storage: Arc<dyn SessionStorage> = match initial {
            Some(session) => Arc::new(MemorySessionStorage::with_session(session)),
            None => Arc::new(MemorySessionStorage::new()),
        };
        Self::with_storage(storage).await
    }

    /// Build a stack over an arbitrary session slot.
    pub async fn with_storage(storage: Arc<dyn SessionStorage>) -> Self {
        init_test_tracing();
        let server = MockServer::start().await;

        let http = Arc::new(
            HttpClient::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("http client should build"),
        );
        let auth = Arc::new(HttpAuthClient::new(Arc::clone(&http), server.uri()));
        let session = Arc::new(SessionStore::new(storage, auth.clone()));
        let refresher = Arc::new(SingleFlightRefresh::new(Arc::clone(&session), auth));
        let transport = Arc::new(HttpTransport::new(http, server.uri()));
        let gateway = Arc::new(RequestGateway::new(
            transport,
            Arc::clone(&session),
            Arc::clone(&refresher),
        ));
        let caches = Arc::new(WarehouseCaches::new(&gateway, &CacheSettings::default()));
        let api = WarehouseApi::new(Arc::clone(&gateway), caches);

        Self { server, session, refresher, gateway, api }
    }
}
