//! L1: the shared key-value store seam.
//!
//! The store is external to the process in a multi-node deployment; [`MemoryStore`] is
//! the single-node implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{CacheError, CacheResult};

/// A TTL-aware string key-value store.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Drops expired entries. Stores with native expiry may leave this a no-op.
    async fn purge_expired(&self) -> CacheResult<usize> {
        Ok(0)
    }

    /// Reachability check used by readiness reporting.
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// In-process [`SharedStore`] with lazy expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every operation fails with [`CacheError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> CacheResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "store marked offline".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .field("offline", &self.offline.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check_online()?;

        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(stored) if stored.expires_at > now => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|s| s.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.check_online()?;

        self.entries.write().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        self.check_online()?;

        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        Ok(before - entries.len())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_online()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
