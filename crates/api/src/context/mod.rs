//! Application context - dependency injection container
//!
//! Builds the access layer once per process:
//!
//! ```text
//! SessionStorage -> SessionStore <- SingleFlightRefresh
//!                        |                 |
//!          HttpTransport -> RequestGateway <-
//!                                |
//!                     WarehouseCaches -> WarehouseApi
//! ```

use std::sync::Arc;

use tracing::{debug, info};
use warehouse_common::CacheStats;
use warehouse_domain::Config;
use warehouse_infra::api::{
    FileSessionStorage, HttpAuthClient, HttpTransport, MemorySessionStorage, SessionStorage,
    SingleFlightRefresh,
};
use warehouse_infra::{
    config, ApiError, HttpClient, RequestGateway, SessionStore, WarehouseApi, WarehouseCaches,
};

use crate::utils::logging::init_tracing;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub refresher: Arc<SingleFlightRefresh>,
    pub gateway: Arc<RequestGateway>,
    pub caches: Arc<WarehouseCaches>,
    pub api: Arc<WarehouseApi>,
}

impl AppContext {
    /// Initialise tracing, read `.env`, load the configuration and build the
    /// context.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if no configuration source is usable.
    pub fn bootstrap() -> Result<Self, ApiError> {
        init_tracing();

        match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "loaded .env"),
            Err(err) => debug!(error = %err, "no .env file loaded"),
        }

        let config = config::load()?;
        Self::new(config)
    }

    /// Create the context for `config`.
    ///
    /// The session slot is a file when `session.storage_path` is set and
    /// process memory otherwise. A previously persisted session is restored.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let storage: Arc<dyn SessionStorage> = match &config.session.storage_path {
            Some(path) => Arc::new(FileSessionStorage::new(path)),
            None => Arc::new(MemorySessionStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    /// Create the context over an explicit session slot
    pub fn with_storage(config: Config, storage: Arc<dyn SessionStorage>) -> Result<Self, ApiError> {
        let base_url = config.api.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("API base URL is empty".into()));
        }

        let http = Arc::new(
            HttpClient::builder()
                .timeout(config.api.timeout())
                .user_agent(concat!("warehouse-client/", env!("CARGO_PKG_VERSION")))
                .build()?,
        );

        let auth = Arc::new(HttpAuthClient::new(Arc::clone(&http), base_url.clone()));
        let session = Arc::new(SessionStore::new(storage, auth.clone()));
        let refresher = Arc::new(SingleFlightRefresh::new(Arc::clone(&session), auth));
        let transport = Arc::new(HttpTransport::new(http, base_url.clone()));
        let gateway =
            Arc::new(RequestGateway::new(transport, Arc::clone(&session), Arc::clone(&refresher)));
        let caches = Arc::new(WarehouseCaches::new(&gateway, &config.cache));
        let api = Arc::new(WarehouseApi::new(Arc::clone(&gateway), Arc::clone(&caches)));

        info!(
            base_url = %base_url,
            timeout_secs = config.api.timeout_seconds,
            entity_ttl_ms = config.cache.entity_ttl_millis,
            persistent_session = config.session.storage_path.is_some(),
            signed_in = session.is_authenticated(),
            "application context ready"
        );

        Ok(Self { config, session, refresher, gateway, caches, api })
    }

    /// Per-cache statistics, keyed by cache name
    pub fn cache_report(&self) -> Vec<(&'static str, CacheStats)> {
        self.caches.stats()
    }

    /// Log diagnostics and drop cached data.
    ///
    /// The session is left untouched so it can be restored on the next start;
    /// call [`SessionStore::sign_out`] first to end it.
    pub fn shutdown(&self) {
        for (name, stats) in self.cache_report() {
            debug!(
                cache = name,
                size = stats.size,
                hits = stats.hits,
                misses = stats.misses,
                coalesced = stats.coalesced,
                hit_rate = stats.hit_rate(),
                "cache statistics at shutdown"
            );
        }
        self.caches.invalidate_all();

        info!(
            signed_in = self.session.is_authenticated(),
            renewals = self.refresher.renewals_started(),
            "shutdown called on AppContext"
        );
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("signed_in", &self.session.is_authenticated())
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}
