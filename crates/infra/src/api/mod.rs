//! Warehouse API access layer
//!
//! Every call from the UI side goes through this module.
//!
//! # Architecture
//!
//! - [`SessionStore`]: zero or one signed-in session, persisted through a
//!   [`SessionStorage`] slot
//! - [`RequestGateway`]: attaches the bearer credential and recovers from a
//!   401 exactly once per call
//! - [`SingleFlightRefresh`]: at most one renewal in flight
//! - [`WarehouseCaches`]: read-through caches over reference data and
//!   recently opened documents
//! - [`WarehouseApi`]: domain commands with their cache invalidations
//! - [`normalize`]: uniform `(code, message, details)` view of failures

pub mod auth;
pub mod caches;
pub mod commands;
pub mod errors;
pub mod gateway;
pub mod normalize;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod transport;

pub use auth::{AuthClient, HttpAuthClient, LoginResponse, RenewResponse};
pub use caches::WarehouseCaches;
pub use commands::{ListFilters, WarehouseApi};
pub use errors::{ApiError, ApiErrorCategory};
pub use gateway::RequestGateway;
pub use normalize::{details_as_list, flatten_details, normalize, normalize_payload, NormalizedError};
pub use refresh::SingleFlightRefresh;
pub use session::{SessionEvent, SessionStore, SignOutReason};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
pub use transport::{endpoint_url, ApiResponse, HttpTransport, RequestSpec, Transport};
