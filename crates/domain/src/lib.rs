//! # Warehouse Domain
//!
//! Business domain types and models for the warehouse client.
//!
//! This crate contains:
//! - The authenticated [`Session`] and the identity it carries
//! - Catalog and document models returned by the remote API
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other warehouse crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
