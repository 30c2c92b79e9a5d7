//! Application constants
//!
//! Centralized location for domain-level constants shared by the access
//! layer crates.

// Remote API
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

// Entity cache window. Long enough to collapse duplicate fetches from
// re-entrant initialisation, not a freshness guarantee.
pub const DEFAULT_ENTITY_TTL_MS: u64 = 3_000;

// Error normalisation
pub const DEFAULT_ERROR_CODE: &str = "ERROR";
pub const DEFAULT_ERROR_MESSAGE: &str = "generic failure";
pub const MAX_ERROR_DETAIL_ITEMS: usize = 10;

// Permission groups issued by the server
pub const ADMIN_GROUP: &str = "admin";
pub const OPERATOR_GROUP: &str = "operator";
