//! Access-layer error types
//!
//! `ApiError` is `Clone`: one settled outcome of a shared fetch or renewal is
//! handed to every waiter.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use warehouse_common::cache::{Cancelled, PageLimitExceeded};
use warehouse_domain::WarehouseError;

/// Coarse classification of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Connection failures and transport timeouts
    Transport,
    /// 401 from a protected endpoint, or no session at all
    Authorization,
    /// Renewal endpoint refused the renewal credential; the session is gone
    RenewalRejected,
    /// Renewal could not complete; the session is kept
    RenewalTransient,
    /// Other 4xx answers, including domain validation failures
    Client,
    /// 5xx answers and undecodable bodies
    Server,
    /// Configuration, storage, cancellation and internal failures
    Local,
}

/// API operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Non-2xx answer; `payload` is the decoded body (`Null` when empty)
    #[error("{path} returned status {status}")]
    Status { status: u16, path: String, payload: Value },

    #[error("Session renewal rejected with status {status}")]
    RenewalRejected { status: u16, payload: Value },

    #[error("Session renewal failed: {0}")]
    RenewalFailed(Box<ApiError>),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Transport,
            Self::Status { status: 401, .. } | Self::NotAuthenticated => {
                ApiErrorCategory::Authorization
            }
            Self::Status { status: 400..=499, .. } => ApiErrorCategory::Client,
            Self::Status { .. } | Self::Decode(_) => ApiErrorCategory::Server,
            Self::RenewalRejected { .. } => ApiErrorCategory::RenewalRejected,
            Self::RenewalFailed(_) => ApiErrorCategory::RenewalTransient,
            Self::Config(_) | Self::Storage(_) | Self::Cancelled | Self::Internal(_) => {
                ApiErrorCategory::Local
            }
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RenewalRejected { status, .. } => Some(*status),
            Self::RenewalFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// A 401 from a protected endpoint; the only status that triggers renewal
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// Decoded response body of the failed call, if the server answered
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Status { payload, .. } | Self::RenewalRejected { payload, .. } => {
                Some(payload).filter(|p| !p.is_null())
            }
            Self::RenewalFailed(inner) => inner.payload(),
            _ => None,
        }
    }

    /// Classify a failure of the renewal endpoint.
    ///
    /// 401 and 400 mean the renewal credential is no longer valid; anything
    /// else is treated as transient.
    pub fn classify_renewal(err: ApiError) -> ApiError {
        match err {
            Self::Status { status: status @ (400 | 401), payload, .. } => {
                Self::RenewalRejected { status, payload }
            }
            Self::RenewalRejected { .. } | Self::RenewalFailed(_) | Self::Cancelled => err,
            other => Self::RenewalFailed(Box::new(other)),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return Self::Network(format!("HTTP connection failure: {err}"));
        }

        if err.is_decode() {
            return Self::Decode(err.to_string());
        }

        if err.is_builder() {
            return Self::Config(format!("Invalid HTTP request: {err}"));
        }

        Self::Network(format!("HTTP transport error: {err}"))
    }
}

impl From<WarehouseError> for ApiError {
    fn from(err: WarehouseError) -> Self {
        match err {
            WarehouseError::Config(msg) => Self::Config(msg),
            WarehouseError::Storage(msg) => Self::Storage(msg),
            WarehouseError::Auth(_) => Self::NotAuthenticated,
            WarehouseError::InvalidInput(msg) | WarehouseError::Internal(msg) => {
                Self::Internal(msg)
            }
        }
    }
}

impl From<Cancelled> for ApiError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<PageLimitExceeded> for ApiError {
    fn from(err: PageLimitExceeded) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
