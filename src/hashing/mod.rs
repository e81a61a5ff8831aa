//! Query normalization and cache-key derivation.
//!
//! Keys are tier-prefixed and session-scoped: `"<tier>:<session>:<hex>"`, where `<hex>`
//! is the BLAKE3 hash of the normalized query.

use blake3::Hasher;

/// Lowercases, trims and collapses inner whitespace so trivially different
/// transcripts of the same question share a key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
pub fn hash_query(normalized: &str) -> [u8; 32] {
    *blake3::hash(normalized.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for fingerprint bucket indices and popularity-table keys, where a rare
/// collision only merges two buckets.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Builds `"<tier>:<session>:<hash(normalize(query))>"`.
pub fn cache_key(tier_prefix: &str, session_id: &str, query: &str) -> String {
    let normalized = normalize_query(query);
    let mut hasher = Hasher::new();
    hasher.update(normalized.as_bytes());
    format!("{}:{}:{}", tier_prefix, session_id, hasher.finalize().to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Hello   World \n"), "hello world");
        assert_eq!(normalize_query("안녕하세요  반갑습니다"), "안녕하세요 반갑습니다");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn test_cache_key_layout() {
        let key = cache_key("mem", "phone-1", "오늘 날씨");
        let parts: Vec<_> = key.splitn(3, ':').collect();

        assert_eq!(parts[0], "mem");
        assert_eq!(parts[1], "phone-1");
        assert_eq!(parts[2].len(), 64);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_key_is_normalization_insensitive() {
        assert_eq!(
            cache_key("exact", "s", "What  is THIS"),
            cache_key("exact", "s", "what is this ")
        );
    }

    #[test]
    fn test_cache_key_scoped_by_tier_and_session() {
        let keys: HashSet<_> = [
            cache_key("mem", "a", "q"),
            cache_key("exact", "a", "q"),
            cache_key("mem", "b", "q"),
            cache_key("mem", "a", "q2"),
        ]
        .into_iter()
        .collect();

        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_hash_query_determinism() {
        assert_eq!(hash_query("abc"), hash_query("abc"));
        assert_ne!(hash_query("abc"), hash_query("abd"));
    }

    #[test]
    fn test_hash_to_u64_determinism() {
        let data = b"session-12345";
        assert_eq!(hash_to_u64(data), hash_to_u64(data));
        assert_ne!(hash_to_u64(b"a"), hash_to_u64(b"b"));
    }
}
