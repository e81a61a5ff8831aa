//! Tiered answer cache.
//!
//! | Tier | Backing | Match |
//! |------|---------|-------|
//! | L0 | [`MemoryCache`] (moka, LRU + TTL) | exact key |
//! | L1 | [`SharedStore`] | exact key, TTL |
//! | L2 | [`SimilarityCache`] | fingerprint cosine ≥ 0.95, per session |
//! | L3 | [`PopularityTracker`] | word-set Jaccard > 0.6 against popular questions |

pub mod error;
pub mod memory;
mod partitions;
pub mod popularity;
pub mod shared;
pub mod similarity;
pub mod tiered;
pub mod types;

#[cfg(test)]
mod tiered_tests;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use popularity::{PopularQuestion, PopularityTracker, lexical_overlap};
pub use shared::{MemoryStore, SharedStore};
pub use similarity::{SimilarityCache, cosine_similarity, fingerprint};
pub use tiered::TieredCache;
pub use types::{CacheConfig, CacheHit, CacheStatsSnapshot, CacheTier};
