//! Unbounded cache for a whole collection

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::read_through::{CacheState, Cancelled, Loader, ReadThroughCache};
use super::stats::CacheStats;
use crate::time::{Clock, SystemClock};

/// Caches the result of one list call until [`invalidate`](Self::invalidate)
///
/// Call `invalidate` after every mutation of the underlying collection.
pub struct ListCache<I, E, C = SystemClock>
where
    C: Clock,
{
    inner: ReadThroughCache<(), Vec<I>, E, C>,
    loader: Loader<Vec<I>, E>,
}

impl<I, E> ListCache<I, E, SystemClock>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, loader: Loader<Vec<I>, E>) -> Self {
        Self::with_clock(name, loader, SystemClock)
    }
}

impl<I, E, C> ListCache<I, E, C>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    pub fn with_clock(name: &'static str, loader: Loader<Vec<I>, E>, clock: C) -> Self {
        Self { inner: ReadThroughCache::with_clock(name, None, clock), loader }
    }

    pub async fn get(&self) -> Result<Vec<I>, E> {
        let loader = Arc::clone(&self.loader);
        self.inner.get_or_fetch((), move || loader()).await
    }

    /// Stop waiting when `cancelled` completes; the shared fetch continues.
    pub async fn get_until<X>(&self, cancelled: X) -> Result<Vec<I>, E>
    where
        X: Future<Output = ()> + Send,
        E: From<Cancelled>,
    {
        let loader = Arc::clone(&self.loader);
        self.inner.get_or_fetch_until((), move || loader(), cancelled).await
    }

    pub fn invalidate(&self) {
        self.inner.invalidate(&());
    }

    pub fn state(&self) -> CacheState {
        self.inner.state(&())
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl<I, E, C> fmt::Debug for ListCache<I, E, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListCache").field("inner", &self.inner).finish_non_exhaustive()
    }
}
