//! Read-through caches with single-flight population
//!
//! Every cache in this module follows one state machine per key:
//! `empty -> in-flight -> populated | empty`. Concurrent readers of a key
//! that is being fetched join the same shared future instead of issuing a
//! second call. Failed fetches are propagated to every waiter and never
//! stored.
//!
//! Three shapes are built on [`ReadThroughCache`]:
//! - [`ListCache`]: one unbounded entry, cleared by explicit invalidation
//! - [`EntityCache`]: keyed entries with a short TTL
//! - [`PaginatedCache`]: one unbounded entry assembled from sequential pages
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use futures::FutureExt;
//! use warehouse_common::cache::ListCache;
//!
//! # tokio_test::block_on(async {
//! let cache: ListCache<&'static str, String> =
//!     ListCache::new("names", Arc::new(|| async { Ok(vec!["a", "b"]) }.boxed()));
//!
//! assert_eq!(cache.get().await.unwrap(), vec!["a", "b"]);
//! # });
//! ```

pub mod entity;
pub mod entry;
pub mod list;
pub mod paginated;
pub mod read_through;
pub mod stats;

pub use entity::{EntityCache, KeyedLoader};
pub use entry::CacheEntry;
pub use list::ListCache;
pub use paginated::{PageChunk, PageLimitExceeded, PageLoader, PaginatedCache, DEFAULT_MAX_PAGES};
pub use read_through::{CacheState, Cancelled, Loader, ReadThroughCache};
pub use stats::CacheStats;
