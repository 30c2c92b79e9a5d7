//! # Warehouse Infrastructure
//!
//! Infrastructure side of the warehouse client: everything that performs
//! I/O.
//!
//! This crate contains:
//! - The HTTP client wrapper
//! - The API access layer (session, gateway, renewal, caches, commands)
//! - Configuration loading from environment and files
//!
//! ## Architecture
//! - Pure types come from `warehouse-domain`
//! - Cache and clock primitives come from `warehouse-common`

pub mod api;
pub mod config;
pub mod http;

// Re-export commonly used items
pub use api::{ApiError, RequestGateway, SessionStore, WarehouseApi, WarehouseCaches};
pub use http::HttpClient;
