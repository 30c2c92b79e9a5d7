//! Modular common utilities shared across warehouse crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstractions
//! - `runtime`: async read-through caches with single-flight population
//! - `observability`: tracing output (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{
    CacheEntry, CacheState, CacheStats, EntityCache, ListCache, PageChunk, PaginatedCache,
    ReadThroughCache,
};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
