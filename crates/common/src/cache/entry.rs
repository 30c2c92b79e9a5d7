//! Stored cache values

use std::time::{Duration, Instant};

/// A value owned by a cache together with its capture time
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub captured_at: Instant,
    /// `None` means the entry lives until explicitly invalidated
    pub ttl: Option<Duration>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, captured_at: Instant, ttl: Option<Duration>) -> Self {
        Self { value, captured_at, ttl }
    }

    /// Fresh while `now - captured_at <= ttl`; unbounded entries never expire.
    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => now.saturating_duration_since(self.captured_at) <= ttl,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }
}
