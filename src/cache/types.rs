use std::time::Duration;

use serde::Serialize;

use crate::constants::{
    DEFAULT_L0_CAPACITY, DEFAULT_L0_TTL, DEFAULT_L1_TTL, DEFAULT_OVERLAP_THRESHOLD,
    DEFAULT_SESSION_IDLE_TTL, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SWEEP_INTERVAL,
    MAX_TRACKED_SESSIONS, PER_SESSION_CAPACITY,
};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheTier {
    /// In-process LRU+TTL map.
    L0,
    /// Shared key-value store.
    L1,
    /// Per-session fingerprint similarity.
    L2,
    /// Popular question lexical overlap.
    L3,
}

impl CacheTier {
    /// Prefix used when building this tier's keys.
    #[inline]
    pub fn key_prefix(&self) -> &'static str {
        match self {
            CacheTier::L0 => "mem",
            CacheTier::L1 => "exact",
            CacheTier::L2 => "sem",
            CacheTier::L3 => "pop",
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::L0 => "L0",
            CacheTier::L1 => "L1",
            CacheTier::L2 => "L2",
            CacheTier::L3 => "L3",
        }
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful tiered lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub value: String,
    pub tier: CacheTier,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l0_capacity: u64,
    pub l0_ttl: Duration,
    pub l1_ttl: Duration,
    pub sweep_interval: Duration,
    pub similarity_threshold: f32,
    pub overlap_threshold: f32,
    pub per_session_capacity: usize,
    /// Sessions with L2/L3 partitions at once.
    pub max_sessions: usize,
    /// Idle time after which the sweeper drops a session's L2/L3 partitions.
    pub session_idle_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l0_capacity: DEFAULT_L0_CAPACITY,
            l0_ttl: DEFAULT_L0_TTL,
            l1_ttl: DEFAULT_L1_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            per_session_capacity: PER_SESSION_CAPACITY,
            max_sessions: MAX_TRACKED_SESSIONS,
            session_idle_ttl: DEFAULT_SESSION_IDLE_TTL,
        }
    }
}

/// Point-in-time view of cache counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStatsSnapshot {
    pub lookups: u64,
    pub l0_hits: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l3_hits: u64,
    pub misses: u64,
    pub l1_errors: u64,
    pub hit_rate: f64,
    pub l0_entries: u64,
}

impl CacheStatsSnapshot {
    pub fn hits(&self) -> u64 {
        self.l0_hits + self.l1_hits + self.l2_hits + self.l3_hits
    }
}
