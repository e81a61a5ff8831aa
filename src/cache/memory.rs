//! L0: bounded in-process cache with strict LRU eviction and per-entry TTL.

use std::sync::Arc;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

/// In-memory LRU cache of answers keyed by tier key.
pub struct MemoryCache {
    entries: Cache<String, Arc<str>>,
    capacity: u64,
    ttl: Duration,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries, each living at most `ttl`.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            capacity,
            ttl,
        }
    }

    /// Returns the value if present and not expired (refreshing its recency).
    #[inline]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.to_string())
    }

    #[inline]
    pub fn insert(&self, key: String, value: &str) {
        self.entries.insert(key, Arc::from(value));
    }

    #[inline]
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|v| v.to_string())
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Approximate entry count; exact after [`Self::run_pending_tasks`].
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Applies pending evictions and drops expired entries.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}
