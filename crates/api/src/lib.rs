//! # Warehouse App
//!
//! Application root of the warehouse client.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Tracing initialisation and logging helpers
//!
//! ## Architecture
//! - Depends on `common`, `domain`, and `infra`
//! - Wires the access layer together once per process

pub mod context;
pub mod utils;

// Re-export for convenience
pub use context::*;
