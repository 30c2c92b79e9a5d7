//! The application's read-through cache instances
//!
//! | cache | shape | call |
//! |---|---|---|
//! | `companies` | list | `GET /companies/` |
//! | `roles` | list | `GET /admin/roles/` |
//! | `all_products` | full scan | `GET /products/?page=N` |
//! | `income_by_id` | TTL entity | `GET /incomes/{id}/` |
//! | `outcome_by_id` | TTL entity | `GET /outcomes/{id}/` |
//!
//! Population calls go through the gateway without a cancellation token:
//! they are shared by every waiter and must not be aborted by one of them.

use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use warehouse_common::cache::{EntityCache, ListCache, PageChunk, PaginatedCache};
use warehouse_common::CacheStats;
use warehouse_domain::{CacheSettings, Company, Income, ListPayload, Outcome, Product, Role};

use super::errors::ApiError;
use super::gateway::RequestGateway;
use super::transport::RequestSpec;

pub const COMPANIES_PATH: &str = "/companies/";
pub const ROLES_PATH: &str = "/admin/roles/";
pub const PRODUCTS_PATH: &str = "/products/";

pub fn income_path(id: i64) -> String {
    format!("/incomes/{id}/")
}

pub fn outcome_path(id: i64) -> String {
    format!("/outcomes/{id}/")
}

/// The five shared caches; one set per [`WarehouseApi`](super::WarehouseApi)
pub struct WarehouseCaches {
    /// Every company, until a company is created
    pub companies: ListCache<Company, ApiError>,
    /// Role catalog, until a role is created or changed
    pub roles: ListCache<Role, ApiError>,
    /// Every product across all pages, until a product is created or changed
    pub all_products: PaginatedCache<Product, ApiError>,
    /// Income documents with their markings, held for the entity TTL
    pub income_by_id: EntityCache<i64, Income, ApiError>,
    /// Outcome documents, held for the entity TTL
    pub outcome_by_id: EntityCache<i64, Outcome, ApiError>,
}

impl WarehouseCaches {
    /// Wire every cache's population call to `gateway`.
    pub fn new(gateway: &Arc<RequestGateway>, settings: &CacheSettings) -> Self {
        let ttl = settings.entity_ttl();

        Self {
            companies: ListCache::new("companies", list_loader(gateway, COMPANIES_PATH)),
            roles: ListCache::new("roles", list_loader(gateway, ROLES_PATH)),
            all_products: PaginatedCache::new("all_products", {
                let gateway = Arc::clone(gateway);
                Arc::new(move |page| {
                    let gateway = Arc::clone(&gateway);
                    async move { fetch_page(&gateway, PRODUCTS_PATH, page).await }.boxed()
                })
            }),
            income_by_id: EntityCache::new("income_by_id", ttl, entity_loader(gateway, income_path)),
            outcome_by_id: EntityCache::new(
                "outcome_by_id",
                ttl,
                entity_loader(gateway, outcome_path),
            ),
        }
    }

    /// Drop every cached value, e.g. after the session changes hands
    pub fn invalidate_all(&self) {
        self.companies.invalidate();
        self.roles.invalidate();
        self.all_products.invalidate();
        self.income_by_id.invalidate(None);
        self.outcome_by_id.invalidate(None);
    }

    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            ("companies", self.companies.stats()),
            ("roles", self.roles.stats()),
            ("all_products", self.all_products.stats()),
            ("income_by_id", self.income_by_id.stats()),
            ("outcome_by_id", self.outcome_by_id.stats()),
        ]
    }
}

impl std::fmt::Debug for WarehouseCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseCaches").field("stats", &self.stats()).finish()
    }
}

fn list_loader<T>(
    gateway: &Arc<RequestGateway>,
    path: &'static str,
) -> warehouse_common::cache::Loader<Vec<T>, ApiError>
where
    T: DeserializeOwned + Send + 'static,
{
    let gateway = Arc::clone(gateway);
    Arc::new(move || {
        let gateway = Arc::clone(&gateway);
        async move {
            let payload: ListPayload<T> = gateway.get_json(path).await?;
            Ok(payload.into_items())
        }
        .boxed()
    })
}

fn entity_loader<T>(
    gateway: &Arc<RequestGateway>,
    path: fn(i64) -> String,
) -> warehouse_common::cache::KeyedLoader<i64, T, ApiError>
where
    T: DeserializeOwned + Send + 'static,
{
    let gateway = Arc::clone(gateway);
    Arc::new(move |id| {
        let gateway = Arc::clone(&gateway);
        async move { gateway.get_json(&path(id)).await }.boxed()
    })
}

/// Fetch one page of a listing; a bare array counts as the last page.
pub async fn fetch_page<T: DeserializeOwned>(
    gateway: &RequestGateway,
    path: &str,
    page: u32,
) -> Result<PageChunk<T>, ApiError> {
    let payload: ListPayload<T> =
        gateway.call(RequestSpec::get(path).with_query("page", page)).await?.json()?;
    let page = payload.into_page();
    Ok(PageChunk { has_next: page.has_next(), items: page.results })
}
