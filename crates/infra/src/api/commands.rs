//! Domain commands for the warehouse API
//!
//! Each command is a thin gateway call. Commands that mutate a cached
//! collection or entity invalidate the matching cache after the server
//! accepted the change, so the next read refetches.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;
use warehouse_domain::{
    Company, Income, ListPayload, NewCompany, NewMarking, NewProduct, NewUser, Outcome, Page,
    Product, ProductMarking, Registration, Role, UserAccount,
};

use super::caches::{
    fetch_page, income_path, outcome_path, WarehouseCaches, COMPANIES_PATH, PRODUCTS_PATH,
    ROLES_PATH,
};
use super::errors::ApiError;
use super::gateway::RequestGateway;
use super::transport::RequestSpec;

const INCOMES_PATH: &str = "/incomes/";
const OUTCOMES_PATH: &str = "/outcomes/";
const USERS_PATH: &str = "/admin/users/";
const RESET_PASSWORD_PATH: &str = "/admin/reset-password/";
const DASHBOARD_PATH: &str = "/stats/dashboard/";
const REGISTER_PATH: &str = "/register/";
const MARKINGS_PATH: &str = "/product-markings/";
const MARKINGS_CHECK_PATH: &str = "/product-markings/check/";

#[derive(Debug, Deserialize)]
struct MarkingExists {
    exists: bool,
}

/// Answer of the batch marking check, either the registered codes or a
/// per-code flag
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchCheck {
    Existing { existing: Vec<String> },
    Flags(std::collections::HashMap<String, bool>),
}

impl BatchCheck {
    fn registered<'a>(&self, asked: &[&'a str]) -> Vec<&'a str> {
        asked
            .iter()
            .copied()
            .filter(|code| match self {
                Self::Existing { existing } => existing.iter().any(|known| known == code),
                Self::Flags(flags) => flags.get(*code).copied().unwrap_or(false),
            })
            .collect()
    }
}

/// Filters forwarded verbatim as query parameters, e.g. `is_archive=false`
pub type ListFilters<'a> = &'a [(&'a str, &'a str)];

/// Which document family a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Income,
    Outcome,
}

impl DocumentKind {
    fn item_path(self, id: i64) -> String {
        match self {
            Self::Income => income_path(id),
            Self::Outcome => outcome_path(id),
        }
    }
}

/// API commands for domain operations
pub struct WarehouseApi {
    gateway: Arc<RequestGateway>,
    caches: Arc<WarehouseCaches>,
}

impl WarehouseApi {
    pub fn new(gateway: Arc<RequestGateway>, caches: Arc<WarehouseCaches>) -> Self {
        Self { gateway, caches }
    }

    pub fn caches(&self) -> &Arc<WarehouseCaches> {
        &self.caches
    }

    // === Accounts ===

    /// Create an account through the open sign-up endpoint; the caller
    /// still has to log in with it
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        self.gateway.call(RequestSpec::post(REGISTER_PATH, registration)?).await?;
        debug!("Account registered");
        Ok(())
    }

    // === Company Operations ===

    /// All companies, served from the list cache
    pub async fn companies(&self) -> Result<Vec<Company>, ApiError> {
        self.caches.companies.get().await
    }

    #[instrument(skip(self, company), fields(name = %company.name))]
    pub async fn create_company(&self, company: &NewCompany) -> Result<Company, ApiError> {
        let created: Company = self.gateway.send_json(Method::POST, COMPANIES_PATH, company).await?;
        self.caches.companies.invalidate();

        debug!(company_id = created.id, "Company created");
        Ok(created)
    }

    // === Product Operations ===

    /// One page of the product listing, uncached
    #[instrument(skip(self))]
    pub async fn products_page(&self, page: u32) -> Result<Page<Product>, ApiError> {
        let payload: ListPayload<Product> = self
            .gateway
            .call(RequestSpec::get(PRODUCTS_PATH).with_query("page", page))
            .await?
            .json()?;
        Ok(payload.into_page())
    }

    /// Every product across all pages, served from the full-scan cache
    pub async fn all_products(&self) -> Result<Vec<Product>, ApiError> {
        self.caches.all_products.get().await
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        let created: Product = self.gateway.send_json(Method::POST, PRODUCTS_PATH, product).await?;
        self.caches.all_products.invalidate();

        debug!(product_id = created.id, "Product created");
        Ok(created)
    }

    // === Marking Operations ===

    #[instrument(skip(self))]
    pub async fn markings(
        &self,
        filters: ListFilters<'_>,
    ) -> Result<Page<ProductMarking>, ApiError> {
        self.list_documents(MARKINGS_PATH, filters).await
    }

    /// Register a marking code; an income it belongs to is refetched on its
    /// next read
    #[instrument(skip(self, marking), fields(marking = %marking.marking))]
    pub async fn create_marking(&self, marking: &NewMarking) -> Result<ProductMarking, ApiError> {
        let created: ProductMarking =
            self.gateway.send_json(Method::POST, MARKINGS_PATH, marking).await?;
        if let Some(income_id) = marking.income.or(created.income) {
            self.caches.income_by_id.invalidate(Some(&income_id));
        }
        Ok(created)
    }

    /// The subset of `markings` that is already registered, in request order
    #[instrument(skip(self, markings), fields(count = markings.len()))]
    pub async fn check_markings<'a>(&self, markings: &[&'a str]) -> Result<Vec<&'a str>, ApiError> {
        if markings.is_empty() {
            return Ok(Vec::new());
        }
        let answer: BatchCheck = self
            .gateway
            .send_json(Method::POST, MARKINGS_CHECK_PATH, &json!({ "markings": markings }))
            .await?;
        Ok(answer.registered(markings))
    }

    /// Whether a marking code is already registered
    #[instrument(skip(self))]
    pub async fn check_marking_exists(&self, marking: &str) -> Result<bool, ApiError> {
        let path = format!("/product-markings/check-marking/{}/", path_segment(marking)?);
        let answer: MarkingExists = self.gateway.get_json(&path).await?;
        Ok(answer.exists)
    }

    /// Partially update a marking of an income line
    ///
    /// # Errors
    ///
    /// Returns the server's validation failure unchanged; the cached income
    /// is only invalidated on success.
    #[instrument(skip(self, changes))]
    pub async fn update_marking<B: Serialize + ?Sized>(
        &self,
        income_id: i64,
        product_id: i64,
        marking_id: i64,
        changes: &B,
    ) -> Result<ProductMarking, ApiError> {
        let path = marking_path(income_id, product_id, marking_id);
        let updated = self.gateway.send_json(Method::PUT, &path, changes).await?;
        self.caches.income_by_id.invalidate(Some(&income_id));
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_marking(
        &self,
        income_id: i64,
        product_id: i64,
        marking_id: i64,
    ) -> Result<(), ApiError> {
        self.gateway
            .call(RequestSpec::delete(marking_path(income_id, product_id, marking_id)))
            .await?;
        self.caches.income_by_id.invalidate(Some(&income_id));
        Ok(())
    }

    // === Income Operations ===

    #[instrument(skip(self))]
    pub async fn incomes(&self, filters: ListFilters<'_>) -> Result<Page<Income>, ApiError> {
        self.list_documents(INCOMES_PATH, filters).await
    }

    /// One income, deduplicated by the short-lived entity cache
    pub async fn income(&self, id: i64) -> Result<Income, ApiError> {
        self.caches.income_by_id.get(id).await
    }

    #[instrument(skip(self, income))]
    pub async fn create_income<B: Serialize + ?Sized>(&self, income: &B) -> Result<Income, ApiError> {
        self.gateway.send_json(Method::POST, INCOMES_PATH, income).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_income<B: Serialize + ?Sized>(
        &self,
        id: i64,
        changes: &B,
    ) -> Result<Income, ApiError> {
        self.update_document(DocumentKind::Income, id, changes).await
    }

    #[instrument(skip(self))]
    pub async fn delete_income(&self, id: i64) -> Result<(), ApiError> {
        self.delete_document(DocumentKind::Income, id).await
    }

    pub async fn archive_income(&self, id: i64) -> Result<Income, ApiError> {
        self.update_income(id, &json!({ "is_archive": true })).await
    }

    pub async fn unarchive_income(&self, id: i64) -> Result<Income, ApiError> {
        self.update_income(id, &json!({ "is_archive": false })).await
    }

    // === Outcome Operations ===

    #[instrument(skip(self))]
    pub async fn outcomes(&self, filters: ListFilters<'_>) -> Result<Page<Outcome>, ApiError> {
        self.list_documents(OUTCOMES_PATH, filters).await
    }

    pub async fn outcome(&self, id: i64) -> Result<Outcome, ApiError> {
        self.caches.outcome_by_id.get(id).await
    }

    #[instrument(skip(self, outcome))]
    pub async fn create_outcome<B: Serialize + ?Sized>(
        &self,
        outcome: &B,
    ) -> Result<Outcome, ApiError> {
        self.gateway.send_json(Method::POST, OUTCOMES_PATH, outcome).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_outcome<B: Serialize + ?Sized>(
        &self,
        id: i64,
        changes: &B,
    ) -> Result<Outcome, ApiError> {
        self.update_document(DocumentKind::Outcome, id, changes).await
    }

    #[instrument(skip(self))]
    pub async fn delete_outcome(&self, id: i64) -> Result<(), ApiError> {
        self.delete_document(DocumentKind::Outcome, id).await
    }

    pub async fn archive_outcome(&self, id: i64) -> Result<Outcome, ApiError> {
        self.update_outcome(id, &json!({ "is_archive": true })).await
    }

    pub async fn unarchive_outcome(&self, id: i64) -> Result<Outcome, ApiError> {
        self.update_outcome(id, &json!({ "is_archive": false })).await
    }

    // === Dashboard ===

    /// Aggregated counters for the dashboard; the shape is server-defined
    pub async fn dashboard_stats(&self) -> Result<Value, ApiError> {
        self.gateway.get_json(DASHBOARD_PATH).await
    }

    // === Admin Operations ===

    #[instrument(skip(self))]
    pub async fn users(&self) -> Result<Vec<UserAccount>, ApiError> {
        let payload: ListPayload<UserAccount> = self.gateway.get_json(USERS_PATH).await?;
        Ok(payload.into_items())
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: &NewUser) -> Result<UserAccount, ApiError> {
        self.gateway.send_json(Method::POST, USERS_PATH, user).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_user<B: Serialize + ?Sized>(
        &self,
        id: i64,
        changes: &B,
    ) -> Result<UserAccount, ApiError> {
        self.gateway.send_json(Method::PATCH, &format!("{USERS_PATH}{id}/"), changes).await
    }

    /// Set a new password for another account
    #[instrument(skip(self, new_password))]
    pub async fn reset_password(&self, user_id: i64, new_password: &str) -> Result<(), ApiError> {
        let body = json!({ "user_id": user_id, "new_password": new_password });
        self.gateway.call(RequestSpec::post(RESET_PASSWORD_PATH, &body)?).await?;
        Ok(())
    }

    /// All permission groups, served from the list cache
    pub async fn roles(&self) -> Result<Vec<Role>, ApiError> {
        self.caches.roles.get().await
    }

    #[instrument(skip(self))]
    pub async fn create_role(&self, name: &str) -> Result<Role, ApiError> {
        let created: Role =
            self.gateway.send_json(Method::POST, ROLES_PATH, &json!({ "name": name })).await?;
        self.caches.roles.invalidate();
        Ok(created)
    }

    // === Helpers ===

    async fn list_documents<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        filters: ListFilters<'_>,
    ) -> Result<Page<T>, ApiError> {
        let spec = filters
            .iter()
            .fold(RequestSpec::get(path), |spec, (key, value)| spec.with_query(*key, value));
        let payload: ListPayload<T> = self.gateway.call(spec).await?.json()?;
        let page = payload.into_page();

        debug!(count = page.results.len(), has_next = page.has_next(), "Documents listed");
        Ok(page)
    }

    async fn update_document<B, T>(&self, kind: DocumentKind, id: i64, changes: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let updated = self.gateway.send_json(Method::PATCH, &kind.item_path(id), changes).await?;
        self.invalidate_document(kind, id);
        Ok(updated)
    }

    async fn delete_document(&self, kind: DocumentKind, id: i64) -> Result<(), ApiError> {
        self.gateway.call(RequestSpec::delete(kind.item_path(id))).await?;
        self.invalidate_document(kind, id);
        Ok(())
    }

    fn invalidate_document(&self, kind: DocumentKind, id: i64) {
        match kind {
            DocumentKind::Income => self.caches.income_by_id.invalidate(Some(&id)),
            DocumentKind::Outcome => self.caches.outcome_by_id.invalidate(Some(&id)),
        }
    }
}

impl std::fmt::Debug for WarehouseApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseApi").field("caches", &self.caches).finish_non_exhaustive()
    }
}

fn marking_path(income_id: i64, product_id: i64, marking_id: i64) -> String {
    format!("/incomes/{income_id}/products/{product_id}/markings/{marking_id}/")
}

/// Percent-encode one path segment; marking codes may contain `/` or `%`.
fn path_segment(raw: &str) -> Result<String, ApiError> {
    let mut url = Url::parse("http://segment.invalid/")
        .map_err(|err| ApiError::Internal(format!("segment encoder: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Internal("segment encoder: URL cannot be a base".into()))?
        .clear()
        .push(raw);
    Ok(url.path().trim_start_matches('/').to_string())
}
