//! Tracing setup and log field helpers

use std::sync::OnceLock;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warehouse_infra::api::ApiErrorCategory;
use warehouse_infra::ApiError;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,warehouse_infra=debug";

static TRACING_INIT: OnceLock<bool> = OnceLock::new();

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG` and falls back to [`DEFAULT_FILTER`]. Only the first
/// call installs anything; the return value reports whether this process
/// owns the subscriber (another one may have been set by the embedder).
pub fn init_tracing() -> bool {
    *TRACING_INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
    })
}

/// Log the outcome of a user-facing operation with structured fields.
///
/// `operation` should be a stable identifier such as `"incomes::archive"`.
#[inline]
pub fn log_operation(operation: &str, elapsed: Duration, outcome: Result<(), &ApiError>) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(()) => info!(operation, duration_ms, "operation_success"),
        Err(err) => {
            warn!(operation, duration_ms, error_type = error_label(err), error = %err, "operation_failure");
        }
    }
}

/// Convert an `ApiError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &ApiError) -> &'static str {
    match error {
        ApiError::Network(_) => "network",
        ApiError::Timeout(_) => "timeout",
        ApiError::Status { .. } => match error.category() {
            ApiErrorCategory::Authorization => "unauthorized",
            ApiErrorCategory::Client => "client",
            _ => "server",
        },
        ApiError::RenewalRejected { .. } => "renewal_rejected",
        ApiError::RenewalFailed(_) => "renewal_failed",
        ApiError::NotAuthenticated => "not_authenticated",
        ApiError::Decode(_) => "decode",
        ApiError::Config(_) => "config",
        ApiError::Storage(_) => "storage",
        ApiError::Cancelled => "cancelled",
        ApiError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn status(status: u16) -> ApiError {
        ApiError::Status { status, path: "/companies/".into(), payload: Value::Null }
    }

    #[test]
    fn status_errors_are_labelled_by_class() {
        assert_eq!(error_label(&status(401)), "unauthorized");
        assert_eq!(error_label(&status(404)), "client");
        assert_eq!(error_label(&status(502)), "server");
    }

    #[test]
    fn renewal_errors_have_distinct_labels() {
        let rejected = ApiError::RenewalRejected { status: 401, payload: Value::Null };
        assert_eq!(error_label(&rejected), "renewal_rejected");
        assert_eq!(error_label(&ApiError::RenewalFailed(Box::new(status(503)))), "renewal_failed");
    }

    #[test]
    fn init_tracing_is_idempotent() {
        let first = init_tracing();
        assert_eq!(init_tracing(), first);
    }
}
