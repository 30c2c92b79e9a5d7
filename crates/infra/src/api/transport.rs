//! Request description and the wire-level transport behind the gateway

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::errors::ApiError;
use crate::http::{read_body, HttpClient};

/// One logical API call
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the API base, e.g. `/incomes/7/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Aborts this call and any wait it does; never a shared renewal
    pub cancel: Option<CancellationToken>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, cancel: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize + ?Sized>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put<B: Serialize + ?Sized>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch<B: Serialize + ?Sized>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Successful (2xx) answer
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Null` for empty bodies
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Issues one request; non-2xx answers come back as [`ApiError::Status`]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, spec: &RequestSpec, bearer: Option<&str>)
        -> Result<ApiResponse, ApiError>;
}

/// Join a base URL and an API path without doubling or dropping slashes
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// [`Transport`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Arc<HttpClient>,
    base_url: String,
}

impl HttpTransport {
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = endpoint_url(&self.base_url, &spec.path);
        let mut request = self.http.request(spec.method.clone(), url);
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let (status, body) = read_body(self.http.send(request).await?).await?;
        if (200..300).contains(&status) {
            Ok(ApiResponse { status, body })
        } else {
            debug!(path = %spec.path, status, "request answered with error status");
            Err(ApiError::Status { status, path: spec.path.clone(), payload: body })
        }
    }
}
