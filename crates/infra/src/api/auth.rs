//! Credential endpoints
//!
//! Login, renewal and revocation talk to the server directly through
//! [`HttpClient`]; they never go through the gateway, so a failing renewal
//! cannot recurse into another renewal.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use warehouse_domain::{Identity, Session};

use super::errors::ApiError;
use super::transport::endpoint_url;
use crate::http::{read_body, HttpClient};

pub const LOGIN_PATH: &str = "/token/";
pub const RENEW_PATH: &str = "/token/refresh/";
pub const REVOKE_PATH: &str = "/logout/";

/// Successful login answer
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

impl LoginResponse {
    pub fn into_session(self) -> Session {
        let identity = Identity {
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            position: self.position,
        };
        Session::new(self.access, self.refresh, identity, self.groups, self.is_superuser)
    }
}

/// Successful renewal answer; `refresh` is present only when the server
/// rotates renewal credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenewResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Server-side credential operations
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn obtain_token(&self, username: &str, secret: &str) -> Result<Session, ApiError>;

    /// Failures are returned unclassified; the caller decides whether the
    /// renewal credential is dead.
    async fn renew_token(&self, renewal_credential: &str) -> Result<RenewResponse, ApiError>;

    async fn revoke_token(&self, renewal_credential: &str) -> Result<(), ApiError>;
}

/// [`AuthClient`] over the warehouse REST API
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    http: Arc<HttpClient>,
    base_url: String,
}

impl HttpAuthClient {
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let url = endpoint_url(&self.base_url, path);
        let request = self.http.request(Method::POST, url).json(&body);
        let (status, payload) = read_body(self.http.send(request).await?).await?;

        if (200..300).contains(&status) {
            Ok(payload)
        } else {
            debug!(path, status, "credential endpoint refused request");
            Err(ApiError::Status { status, path: path.to_string(), payload })
        }
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn obtain_token(&self, username: &str, secret: &str) -> Result<Session, ApiError> {
        let payload =
            self.post(LOGIN_PATH, json!({ "username": username, "password": secret })).await?;
        let login: LoginResponse = serde_json::from_value(payload)?;
        Ok(login.into_session())
    }

    async fn renew_token(&self, renewal_credential: &str) -> Result<RenewResponse, ApiError> {
        let payload = self.post(RENEW_PATH, json!({ "refresh": renewal_credential })).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn revoke_token(&self, renewal_credential: &str) -> Result<(), ApiError> {
        self.post(REVOKE_PATH, json!({ "refresh_token": renewal_credential })).await.map(|_| ())
    }
}
