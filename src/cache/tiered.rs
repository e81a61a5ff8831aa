//! Tiered answer cache: L0 memory → L1 shared store → L2 similarity → L3 popularity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Timelike;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::memory::MemoryCache;
use super::popularity::{PopularQuestion, PopularityTracker};
use super::shared::{MemoryStore, SharedStore};
use super::similarity::SimilarityCache;
use super::types::{CacheConfig, CacheHit, CacheStatsSnapshot, CacheTier};
use crate::hashing::cache_key;

#[derive(Default)]
struct CacheStats {
    lookups: AtomicU64,
    l0_hits: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    l3_hits: AtomicU64,
    misses: AtomicU64,
    l1_errors: AtomicU64,
}

/// Four-tier cache consulted fastest-first. Any hit is back-filled into the faster tiers.
pub struct TieredCache {
    l0: MemoryCache,
    l1: Arc<dyn SharedStore>,
    l2: SimilarityCache,
    l3: PopularityTracker,
    config: CacheConfig,
    stats: CacheStats,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("l0", &self.l0)
            .field("l1", &self.l1.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    pub fn new(config: CacheConfig, l1: Arc<dyn SharedStore>) -> Self {
        Self {
            l0: MemoryCache::new(config.l0_capacity, config.l0_ttl),
            l1,
            l2: SimilarityCache::new(config.similarity_threshold, config.per_session_capacity)
                .with_max_sessions(config.max_sessions),
            l3: PopularityTracker::new(config.overlap_threshold, config.per_session_capacity)
                .with_max_sessions(config.max_sessions),
            config,
            stats: CacheStats::default(),
        }
    }

    /// Single-node cache whose shared tier is an in-process [`MemoryStore`].
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn l0(&self) -> &MemoryCache {
        &self.l0
    }

    pub fn l2(&self) -> &SimilarityCache {
        &self.l2
    }

    pub fn l3(&self) -> &PopularityTracker {
        &self.l3
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks `query` up tier by tier. An unavailable shared store is skipped.
    #[instrument(skip(self, query), fields(query_len = query.len(), session_id = session_id))]
    pub async fn get(&self, query: &str, session_id: &str) -> Option<CacheHit> {
        let started = Instant::now();
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let l0_key = cache_key(CacheTier::L0.key_prefix(), session_id, query);
        if let Some(value) = self.l0.get(&l0_key) {
            self.stats.l0_hits.fetch_add(1, Ordering::Relaxed);
            debug!("L0 cache hit");
            return Some(self.hit(value, CacheTier::L0, started));
        }

        let l1_key = cache_key(CacheTier::L1.key_prefix(), session_id, query);
        match self.l1.get(&l1_key).await {
            Ok(Some(value)) => {
                self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
                self.l0.insert(l0_key, &value);
                debug!("L1 cache hit");
                return Some(self.hit(value, CacheTier::L1, started));
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.l1_errors.fetch_add(1, Ordering::Relaxed);
                warn!(store = self.l1.name(), error = %e, "L1 lookup failed; skipping tier");
            }
        }

        if let Some((value, score)) = self.l2.find_similar(query, session_id) {
            self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
            self.l0.insert(l0_key, &value);
            self.set_l1(&l1_key, &value).await;
            debug!(similarity = score, "L2 cache hit");
            return Some(self.hit(value, CacheTier::L2, started));
        }

        if let Some((value, overlap)) = self.l3.lookup(query, session_id) {
            self.stats.l3_hits.fetch_add(1, Ordering::Relaxed);
            self.l0.insert(l0_key, &value);
            self.set_l1(&l1_key, &value).await;
            let l2_key = cache_key(CacheTier::L2.key_prefix(), session_id, query);
            self.l2.store(l2_key, query, &value, session_id);
            debug!(overlap, "L3 cache hit");
            return Some(self.hit(value, CacheTier::L3, started));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss");
        None
    }

    /// Writes `value` into every tier and counts the question's popularity.
    #[instrument(skip(self, query, value), fields(query_len = query.len(), session_id = session_id))]
    pub async fn set(&self, query: &str, value: &str, session_id: &str) {
        self.set_exact(query, value, session_id).await;
        self.set_similar(query, value, session_id);
    }

    /// Writes only the exact-key tiers (L0, L1).
    ///
    /// Used for answers to unfinished questions: a later, longer question must not be
    /// matched against them by L2/L3.
    pub async fn set_exact(&self, query: &str, value: &str, session_id: &str) {
        self.l0.insert(
            cache_key(CacheTier::L0.key_prefix(), session_id, query),
            value,
        );
        self.set_l1(
            &cache_key(CacheTier::L1.key_prefix(), session_id, query),
            value,
        )
        .await;
    }

    /// Adds a finished question to the similarity tiers (L2, L3).
    pub fn set_similar(&self, query: &str, value: &str, session_id: &str) {
        self.l2.store(
            cache_key(CacheTier::L2.key_prefix(), session_id, query),
            query,
            value,
            session_id,
        );
        self.l3
            .record(session_id, query, value, chrono::Local::now().hour());
    }

    async fn set_l1(&self, key: &str, value: &str) {
        if let Err(e) = self.l1.set(key, value, self.config.l1_ttl).await {
            self.stats.l1_errors.fetch_add(1, Ordering::Relaxed);
            warn!(store = self.l1.name(), error = %e, "L1 write failed");
        }
    }

    fn hit(&self, value: String, tier: CacheTier, started: Instant) -> CacheHit {
        CacheHit {
            value,
            tier,
            elapsed: started.elapsed(),
        }
    }

    /// Questions most asked during the current hour of day.
    pub fn trending_now(&self, limit: usize) -> Vec<PopularQuestion> {
        self.l3.trending(chrono::Local::now().hour(), limit)
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let mut snapshot = CacheStatsSnapshot {
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            l0_hits: self.stats.l0_hits.load(Ordering::Relaxed),
            l1_hits: self.stats.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.stats.l2_hits.load(Ordering::Relaxed),
            l3_hits: self.stats.l3_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            l1_errors: self.stats.l1_errors.load(Ordering::Relaxed),
            hit_rate: 0.0,
            l0_entries: self.l0.len(),
        };
        if snapshot.lookups > 0 {
            snapshot.hit_rate = snapshot.hits() as f64 / snapshot.lookups as f64;
        }
        snapshot
    }

    /// Whether the shared store answers. L0, L2 and L3 are in-process and always up.
    pub async fn shared_store_available(&self) -> bool {
        match self.l1.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(store = self.l1.name(), error = %e, "Shared store unreachable");
                false
            }
        }
    }

    /// One expiry pass over L0, the shared store and idle session partitions.
    pub async fn sweep(&self) {
        self.l0.run_pending_tasks();
        let idle = self.config.session_idle_ttl;
        let pruned = self.l2.prune_idle(idle) + self.l3.prune_idle(idle);
        if pruned > 0 {
            debug!(pruned, "Dropped idle session partitions");
        }
        match self.l1.purge_expired().await {
            Ok(purged) if purged > 0 => debug!(purged, "Purged expired L1 entries"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "L1 purge failed"),
        }
    }

    /// Runs [`Self::sweep`] every `sweep_interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => cache.sweep().await,
                }
            }
            info!("Cache sweeper stopped");
        })
    }
}
