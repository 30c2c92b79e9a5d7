//! Generic read-through cache core
//!
//! [`ReadThroughCache`] memoizes the outcome of an async fetch per key. The
//! check for a fresh entry, the join of an in-flight fetch and the creation
//! of a new one all happen under one synchronous lock, so two readers of the
//! same key can never both start a fetch.
//!
//! Each fetch runs on its own tokio task and is handed out as a [`Shared`]
//! handle: every waiter observes the same outcome. A waiter that stops
//! waiting only drops its own handle; the fetch keeps running, settles and
//! releases its ticket even when nobody is waiting for it any more.
//!
//! Reads must happen inside a tokio runtime.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, Either, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::entry::CacheEntry;
use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

/// Factory for the fetch backing a keyless cache
pub type Loader<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

type Ticket<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Observable state of one cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No fresh entry and no fetch in flight
    Empty,
    /// A fetch is in flight and new readers will join it
    InFlight,
    /// A fresh entry is stored
    Populated,
}

/// The caller stopped waiting before the fetch settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cache read cancelled")
    }
}

impl std::error::Error for Cancelled {}

struct InFlight<T, E> {
    id: u64,
    ticket: Ticket<T, E>,
}

struct State<K, T, E> {
    entries: HashMap<K, CacheEntry<T>>,
    inflight: HashMap<K, InFlight<T, E>>,
    next_ticket: u64,
}

impl<K, T, E> Default for State<K, T, E> {
    fn default() -> Self {
        Self { entries: HashMap::new(), inflight: HashMap::new(), next_ticket: 0 }
    }
}

enum Lookup<T, E> {
    Hit(T),
    Pending(Ticket<T, E>),
}

/// Keyed read-through cache with single-flight population
pub struct ReadThroughCache<K, T, E, C = SystemClock>
where
    C: Clock,
{
    name: &'static str,
    state: Arc<Mutex<State<K, T, E>>>,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
    clock: C,
    metrics: MetricsCollector,
}

impl<K, T, E> ReadThroughCache<K, T, E, SystemClock>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Entries live until invalidated
    pub fn unbounded(name: &'static str) -> Self {
        Self::with_clock(name, None, SystemClock)
    }

    /// Entries expire `ttl` after capture
    pub fn with_ttl(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, Some(ttl), SystemClock)
    }
}

impl<K, T, E, C> ReadThroughCache<K, T, E, C>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Create a cache whose TTL is measured on `clock`; `None` keeps entries
    /// until they are invalidated.
    pub fn with_clock(name: &'static str, ttl: Option<Duration>, clock: C) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(State::default())),
            ttl,
            max_entries: None,
            clock,
            metrics: MetricsCollector::new(),
        }
    }

    /// Bound the number of stored entries; the oldest entry is evicted first.
    #[must_use]
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max.max(1));
        self
    }

    /// Label used in logs and statistics
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Serve a fresh entry, join the fetch in flight, or start `fetch`.
    ///
    /// `fetch` is invoked while the cache lock is held and must only build
    /// the future; it must not call back into this cache. The future is
    /// spawned on the current tokio runtime.
    pub async fn get_or_fetch<F>(&self, key: K, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, E>> + Send,
    {
        match self.lookup(key, fetch) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(ticket) => ticket.await,
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but stop waiting once
    /// `cancelled` completes. The fetch itself keeps running for other
    /// readers.
    pub async fn get_or_fetch_until<F, X>(&self, key: K, fetch: F, cancelled: X) -> Result<T, E>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, E>> + Send,
        X: Future<Output = ()> + Send,
        E: From<Cancelled>,
    {
        let ticket = match self.lookup(key, fetch) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Pending(ticket) => ticket,
        };

        let cancelled = std::pin::pin!(cancelled);
        match future::select(cancelled, ticket).await {
            Either::Left(((), _)) => Err(E::from(Cancelled)),
            Either::Right((outcome, _)) => outcome,
        }
    }

    /// Fresh stored value, without fetching
    pub fn peek(&self, key: &K) -> Option<T> {
        let now = self.clock.now();
        let state = self.state.lock();
        state.entries.get(key).filter(|entry| entry.is_fresh(now)).map(|entry| entry.value.clone())
    }

    pub fn state(&self, key: &K) -> CacheState {
        let now = self.clock.now();
        let state = self.state.lock();
        if state.entries.get(key).is_some_and(|entry| entry.is_fresh(now)) {
            CacheState::Populated
        } else if state.inflight.contains_key(key) {
            CacheState::InFlight
        } else {
            CacheState::Empty
        }
    }

    /// Drop the entry and the in-flight fetch for `key`.
    ///
    /// Waiters already joined to the dropped fetch still receive its
    /// outcome, but the outcome is not stored.
    pub fn invalidate(&self, key: &K) {
        let mut state = self.state.lock();
        let had_entry = state.entries.remove(key).is_some();
        let had_ticket = state.inflight.remove(key).is_some();
        drop(state);

        self.metrics.record_invalidation();
        debug!(cache = self.name, key = ?key, had_entry, had_ticket, "invalidated");
    }

    /// Drop every entry and in-flight fetch
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        let entries = state.entries.len();
        let tickets = state.inflight.len();
        state.entries.clear();
        state.inflight.clear();
        drop(state);

        self.metrics.record_invalidation();
        debug!(cache = self.name, entries, tickets, "invalidated all");
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }

    fn lookup<F>(&self, key: K, fetch: F) -> Lookup<T, E>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, E>>,
    {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.entries.get(&key) {
            Some(entry) if entry.is_fresh(now) => {
                self.metrics.record_hit();
                return Lookup::Hit(entry.value.clone());
            }
            Some(entry) => {
                debug!(cache = self.name, key = ?key, age_ms = entry.age(now).as_millis() as u64, "entry expired");
                state.entries.remove(&key);
                self.metrics.record_expiration();
            }
            None => {}
        }

        if let Some(inflight) = state.inflight.get(&key) {
            self.metrics.record_coalesced();
            return Lookup::Pending(inflight.ticket.clone());
        }

        self.metrics.record_miss();
        state.next_ticket += 1;
        let id = state.next_ticket;
        debug!(cache = self.name, key = ?key, ticket = id, "miss; starting fetch");

        let task = tokio::spawn(self.settle(key.clone(), id, fetch()));
        let ticket = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // Aborted only while the runtime shuts down, which drops
                    // every waiter as well.
                    Err(_) => future::pending().await,
                },
            }
        }
        .boxed()
        .shared();
        state.inflight.insert(key, InFlight { id, ticket: ticket.clone() });
        Lookup::Pending(ticket)
    }

    /// Wrap a fetch so that, once it settles, its ticket is released and a
    /// successful value is stored. Nothing is stored if the ticket was
    /// invalidated or replaced meanwhile.
    fn settle(
        &self,
        key: K,
        id: u64,
        fetch: BoxFuture<'static, Result<T, E>>,
    ) -> impl Future<Output = Result<T, E>> + Send + 'static {
        let state = Arc::downgrade(&self.state);
        let clock = self.clock.clone();
        let ttl = self.ttl;
        let max_entries = self.max_entries;
        let metrics = self.metrics.clone();
        let name = self.name;

        async move {
            let outcome = fetch.await;

            let Some(state) = state.upgrade() else {
                return outcome;
            };
            let mut guard = state.lock();
            let state = &mut *guard;

            if !state.inflight.get(&key).is_some_and(|inflight| inflight.id == id) {
                debug!(cache = name, key = ?key, ticket = id, "fetch settled after invalidation; discarded");
                return outcome;
            }
            state.inflight.remove(&key);

            match &outcome {
                Ok(value) => {
                    if let Some(max) = max_entries {
                        while state.entries.len() >= max && !state.entries.contains_key(&key) {
                            let oldest = state
                                .entries
                                .iter()
                                .min_by_key(|(_, entry)| entry.captured_at)
                                .map(|(k, _)| k.clone());
                            match oldest {
                                Some(oldest) => {
                                    state.entries.remove(&oldest);
                                    metrics.record_eviction();
                                }
                                None => break,
                            }
                        }
                    }
                    state.entries.insert(key.clone(), CacheEntry::new(value.clone(), clock.now(), ttl));
                    metrics.record_insert();
                    debug!(cache = name, key = ?key, ticket = id, "populated");
                }
                Err(_) => {
                    debug!(cache = name, key = ?key, ticket = id, "fetch failed; cache stays empty");
                }
            }

            outcome
        }
    }
}

impl<K, T, E, C> fmt::Debug for ReadThroughCache<K, T, E, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReadThroughCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("entries", &state.entries.len())
            .field("in_flight", &state.inflight.len())
            .finish()
    }
}
