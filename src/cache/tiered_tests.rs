use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::shared::{MemoryStore, SharedStore};
use super::tiered::TieredCache;
use super::types::{CacheConfig, CacheTier};
use crate::hashing::cache_key;

fn cache_with_store() -> (TieredCache, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache = TieredCache::new(CacheConfig::default(), store.clone());
    (cache, store)
}

#[tokio::test]
async fn test_set_then_get_hits_l0() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache.set("오늘 날씨 어때", "맑아요", "s1").await;

    let hit = cache.get("오늘 날씨 어때", "s1").await.unwrap();
    assert_eq!(hit.value, "맑아요");
    assert_eq!(hit.tier, CacheTier::L0);
}

#[tokio::test]
async fn test_get_is_normalization_insensitive() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache.set("오늘 날씨 어때", "맑아요", "s1").await;

    let hit = cache.get("  오늘   날씨 어때 ", "s1").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L0);
}

#[tokio::test]
async fn test_miss_is_counted() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    assert!(cache.get("처음 묻는 질문", "s1").await.is_none());

    let stats = cache.stats();
    assert_eq!(stats.lookups, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.0);
}

#[tokio::test]
async fn test_l1_hit_backfills_l0() {
    let (cache, store) = cache_with_store();
    let key = cache_key(CacheTier::L1.key_prefix(), "s1", "공유된 질문");
    store.set(&key, "공유된 답", Duration::from_secs(60)).await.unwrap();

    let first = cache.get("공유된 질문", "s1").await.unwrap();
    assert_eq!(first.tier, CacheTier::L1);

    let second = cache.get("공유된 질문", "s1").await.unwrap();
    assert_eq!(second.tier, CacheTier::L0);
    assert_eq!(second.value, "공유된 답");
}

#[tokio::test]
async fn test_unavailable_l1_is_skipped() {
    let (cache, store) = cache_with_store();
    store.set_offline(true);

    cache.set("서울 날씨 어때요", "맑아요", "s1").await;
    let hit = cache.get("서울 날씨 어때요", "s1").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L0);

    cache.l0().clear();
    cache.l0().run_pending_tasks();
    let hit = cache.get("서울 날씨 어때요", "s1").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L2);
    assert!(cache.stats().l1_errors >= 2);
}

#[tokio::test]
async fn test_l2_hit_on_rephrasing_backfills_faster_tiers() {
    let (cache, store) = cache_with_store();
    cache.set("서울 날씨 어때요", "맑아요", "s1").await;

    let hit = cache.get("서울 날씨 는 어때요", "s1").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L2);
    assert_eq!(hit.value, "맑아요");

    let l1_key = cache_key(CacheTier::L1.key_prefix(), "s1", "서울 날씨 는 어때요");
    assert_eq!(store.get(&l1_key).await.unwrap().as_deref(), Some("맑아요"));

    let again = cache.get("서울 날씨 는 어때요", "s1").await.unwrap();
    assert_eq!(again.tier, CacheTier::L0);
}

#[tokio::test]
async fn test_exact_writes_are_not_matched_by_similarity() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache.set_exact("오늘 서울", "부분 답", "s1").await;

    assert_eq!(
        cache.get("오늘 서울", "s1").await.map(|h| h.tier),
        Some(CacheTier::L0)
    );
    assert!(cache.get("오늘 서울 날씨", "s1").await.is_none());
    assert!(cache.get("오늘 서울", "s2").await.is_none());
    assert!(cache.trending_now(5).is_empty());
}

#[tokio::test]
async fn test_l2_does_not_cross_sessions() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache.set("서울 날씨 어때요", "맑아요", "s1").await;

    let hit = cache.get("서울 날씨 는 어때요", "s2").await;
    // another session can only reach this answer through L3's word overlap
    assert!(hit.is_none_or(|h| h.tier == CacheTier::L3));
}

#[tokio::test]
async fn test_l3_hit_from_popular_question() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache
        .set("오늘 서울 날씨 어때", "맑습니다", "other-session")
        .await;

    let hit = cache.get("오늘 서울 날씨 어때 정말", "s1").await.unwrap();
    assert_eq!(hit.tier, CacheTier::L3);
    assert_eq!(hit.value, "맑습니다");

    let again = cache.get("오늘 서울 날씨 어때 정말", "s1").await.unwrap();
    assert_eq!(again.tier, CacheTier::L0);

    let stats = cache.stats();
    assert_eq!(stats.l3_hits, 1);
    assert_eq!(stats.l0_hits, 1);
}

#[tokio::test]
async fn test_trending_now_reflects_sets() {
    let cache = TieredCache::in_memory(CacheConfig::default());
    cache.set("인기 질문", "답", "s1").await;
    cache.set("인기 질문", "답", "s2").await;

    let trending = cache.trending_now(5);
    assert_eq!(trending[0].question, "인기 질문");
    assert_eq!(trending[0].count, 2);
}

#[tokio::test]
async fn test_sweep_drops_idle_session_partitions() {
    let cache = TieredCache::in_memory(CacheConfig {
        session_idle_ttl: Duration::from_millis(10),
        ..CacheConfig::default()
    });
    cache.set("서울 날씨 어때요", "맑아요", "s1").await;
    assert_eq!(cache.l2().session_count(), 1);
    assert_eq!(cache.l3().session_count(), 1);

    tokio::time::sleep(Duration::from_millis(30)).await;
    cache.sweep().await;

    assert_eq!(cache.l2().session_count(), 0);
    assert_eq!(cache.l3().session_count(), 0);
    assert_eq!(cache.trending_now(5).len(), 1);
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let cache = Arc::new(TieredCache::in_memory(CacheConfig {
        sweep_interval: Duration::from_millis(10),
        l0_ttl: Duration::from_millis(5),
        ..CacheConfig::default()
    }));
    cache.set("잠깐 질문", "답", "s1").await;

    let shutdown = CancellationToken::new();
    let handle = cache.spawn_sweeper(shutdown.clone());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(cache.l0().len(), 0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper should stop")
        .unwrap();
}
