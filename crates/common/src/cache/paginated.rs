//! Full-scan cache over a paginated listing

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::read_through::{CacheState, Cancelled, ReadThroughCache};
use super::stats::CacheStats;
use crate::time::{Clock, SystemClock};

/// Scans stop with [`PageLimitExceeded`] after this many pages by default
pub const DEFAULT_MAX_PAGES: u32 = 500;

/// The listing still reported a further page after the scan's page limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimitExceeded {
    pub cache: &'static str,
    pub max_pages: u32,
}

impl fmt::Display for PageLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} listing did not end within {} pages", self.cache, self.max_pages)
    }
}

impl std::error::Error for PageLimitExceeded {}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk<I> {
    pub items: Vec<I>,
    /// The server reported a further page
    pub has_next: bool,
}

/// Factory for the fetch of one page; pages are numbered from 1
pub type PageLoader<I, E> =
    Arc<dyn Fn(u32) -> BoxFuture<'static, Result<PageChunk<I>, E>> + Send + Sync>;

/// Fetches every page in order on a miss and stores the concatenation as a
/// single unbounded entry
pub struct PaginatedCache<I, E, C = SystemClock>
where
    C: Clock,
{
    inner: ReadThroughCache<(), Vec<I>, E, C>,
    pages: PageLoader<I, E>,
    max_pages: u32,
}

impl<I, E> PaginatedCache<I, E, SystemClock>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + From<PageLimitExceeded> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, pages: PageLoader<I, E>) -> Self {
        Self::with_clock(name, pages, SystemClock)
    }
}

impl<I, E, C> PaginatedCache<I, E, C>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + From<PageLimitExceeded> + Send + Sync + 'static,
    C: Clock,
{
    pub fn with_clock(name: &'static str, pages: PageLoader<I, E>, clock: C) -> Self {
        Self {
            inner: ReadThroughCache::with_clock(name, None, clock),
            pages,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Fail the scan instead of requesting page `max_pages + 1`.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub async fn get(&self) -> Result<Vec<I>, E> {
        let scan = self.scan();
        self.inner.get_or_fetch((), move || scan).await
    }

    pub async fn get_until<X>(&self, cancelled: X) -> Result<Vec<I>, E>
    where
        X: Future<Output = ()> + Send,
        E: From<Cancelled>,
    {
        let scan = self.scan();
        self.inner.get_or_fetch_until((), move || scan, cancelled).await
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

    /// Sequential scan from page 1; any page failure fails the whole scan,
    /// as does a listing that is still going after `max_pages`.
    fn scan(&self) -> BoxFuture<'static, Result<Vec<I>, E>> {
        let pages = Arc::clone(&self.pages);
        let name = self.inner.name();
        let max_pages = self.max_pages;
        async move {
            let mut items = Vec::new();
            let mut page = 1_u32;
            loop {
                let chunk = pages(page).await?;
                let last = !chunk.has_next || chunk.items.is_empty();
                items.extend(chunk.items);
                if last {
                    break;
                }
                if page >= max_pages {
                    warn!(cache = name, max_pages, "listing still has pages; giving up");
                    return Err(E::from(PageLimitExceeded { cache: name, max_pages }));
                }
                page += 1;
            }
            debug!(cache = name, pages = page, items = items.len(), "full scan complete");
            Ok(items)
        }
        .boxed()
    }
}

impl<I, E, C> fmt::Debug for PaginatedCache<I, E, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedCache").field("inner", &self.inner).finish_non_exhaustive()
    }
}
