//! Short-lived per-entity cache
//!
//! Suppresses duplicate fetches of the same entity issued within a few
//! seconds of each other, typically by several views opening one document.
//! Entries are never revalidated against changes made elsewhere; the TTL is
//! the only bound on staleness.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use super::read_through::{CacheState, Cancelled, ReadThroughCache};
use super::stats::CacheStats;
use crate::time::{Clock, SystemClock};

/// Factory for the fetch of one entity
pub type KeyedLoader<K, T, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// TTL cache keyed by entity id
pub struct EntityCache<K, T, E, C = SystemClock>
where
    C: Clock,
{
    inner: ReadThroughCache<K, T, E, C>,
    loader: KeyedLoader<K, T, E>,
}

impl<K, T, E> EntityCache<K, T, E, SystemClock>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration, loader: KeyedLoader<K, T, E>) -> Self {
        Self::with_clock(name, ttl, loader, SystemClock)
    }
}

impl<K, T, E, C> EntityCache<K, T, E, C>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Only the most recently fetched entity is kept; fetches for other ids
    /// may still be in flight concurrently.
    pub fn with_clock(
        name: &'static str,
        ttl: Duration,
        loader: KeyedLoader<K, T, E>,
        clock: C,
    ) -> Self {
        Self { inner: ReadThroughCache::with_clock(name, Some(ttl), clock).max_entries(1), loader }
    }

    pub async fn get(&self, id: K) -> Result<T, E> {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();
        self.inner.get_or_fetch(id, move || loader(key)).await
    }

    pub async fn get_until<X>(&self, id: K, cancelled: X) -> Result<T, E>
    where
        X: Future<Output = ()> + Send,
        E: From<Cancelled>,
    {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();
        self.inner.get_or_fetch_until(id, move || loader(key), cancelled).await
    }

    /// Clear one id, or everything when `id` is `None`
    pub fn invalidate(&self, id: Option<&K>) {
        match id {
            Some(id) => self.inner.invalidate(id),
            None => self.inner.invalidate_all(),
        }
    }

    pub fn state(&self, id: &K) -> CacheState {
        self.inner.state(id)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.inner.ttl()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl<K, T, E, C> fmt::Debug for EntityCache<K, T, E, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache").field("inner", &self.inner).finish_non_exhaustive()
    }
}
