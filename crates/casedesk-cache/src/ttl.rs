//! Concurrent TTL cache backed by [`DashMap`].

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Outcome of a lookup, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Expired,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    /// Entries currently stored, including not yet purged expired ones
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_seconds: u64,
}

/// A cloneable handle to a shared TTL cache.
///
/// Expired entries are dropped lazily on lookup.
#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a clone of the live entry for `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).0
    }

    /// Like [`TtlCache::get`], also reporting how the lookup went.
    pub fn lookup(&self, key: &str) -> (Option<V>, CacheLookup) {
        let now = Instant::now();
        let outcome = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                return self.record(Some(entry.value.clone()), CacheLookup::Hit);
            }
            Some(_) => CacheLookup::Expired,
            None => CacheLookup::Miss,
        };

        if outcome == CacheLookup::Expired {
            // Re-check under the write lock so a fresh insert is not removed.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(cache.key = %key, "Cache entry expired");
        }
        self.record(None, outcome)
    }

    fn record(&self, value: Option<V>, outcome: CacheLookup) -> (Option<V>, CacheLookup) {
        let counter = if outcome == CacheLookup::Hit {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        (value, outcome)
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(self.ttl),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Removes one key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            debug!(cache.key = %key, "Cache invalidated");
        }
        removed
    }

    /// Removes every key starting with `prefix`. Returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());
        debug!(cache.prefix = %prefix, cache.removed = removed, "Prefix invalidation complete");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
