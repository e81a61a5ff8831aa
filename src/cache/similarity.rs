//! L2: per-session fingerprint similarity.
//!
//! Each query is reduced to a fixed-size hashed bag-of-words vector. A lookup compares
//! the query's fingerprint against the session's recent entries by cosine similarity.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::RwLock;

use super::partitions::SessionPartitions;
use crate::constants::{
    FINGERPRINT_DIM, FINGERPRINT_MAX_TOKENS, FINGERPRINT_STOP_WORDS, MAX_TRACKED_SESSIONS,
};
use crate::hashing::{hash_to_u64, normalize_query};

/// Builds the L2 fingerprint of `text`.
///
/// Content words (stop words and single characters dropped) are hashed into
/// [`FINGERPRINT_DIM`] buckets with weight `1 / (position + 1)`; the result is
/// L2-normalized. Text without content words yields the zero vector.
pub fn fingerprint(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; FINGERPRINT_DIM];
    let normalized = normalize_query(text);

    let words = normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && !FINGERPRINT_STOP_WORDS.contains(w))
        .take(FINGERPRINT_MAX_TOKENS);

    for (position, word) in words.enumerate() {
        let bucket = (hash_to_u64(word.as_bytes()) % FINGERPRINT_DIM as u64) as usize;
        vector[bucket] += 1.0 / (position as f32 + 1.0);
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Cosine similarity; `0.0` when either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone)]
struct SimilarityEntry {
    key: String,
    value: String,
    fingerprint: Vec<f32>,
}

/// Per-session ring of recent fingerprinted answers.
#[derive(Debug)]
pub struct SimilarityCache {
    threshold: f32,
    capacity: usize,
    partitions: RwLock<SessionPartitions<VecDeque<SimilarityEntry>>>,
}

impl SimilarityCache {
    pub fn new(threshold: f32, capacity: usize) -> Self {
        Self {
            threshold,
            capacity: capacity.max(1),
            partitions: RwLock::new(SessionPartitions::new(MAX_TRACKED_SESSIONS)),
        }
    }

    /// Caps how many sessions keep a partition.
    pub fn with_max_sessions(self, max_sessions: usize) -> Self {
        Self {
            partitions: RwLock::new(SessionPartitions::new(max_sessions)),
            ..self
        }
    }

    /// Best match at or above the threshold within `session_id`'s partition.
    pub fn find_similar(&self, query: &str, session_id: &str) -> Option<(String, f32)> {
        let probe = fingerprint(query);
        let partitions = self.partitions.read();
        let entries = partitions.get(session_id)?;

        entries
            .iter()
            .map(|e| (e, cosine_similarity(&probe, &e.fingerprint)))
            .filter(|(_, score)| *score >= self.threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, score)| (e.value.clone(), score))
    }

    /// Stores (or refreshes) an entry, evicting the session's oldest past capacity.
    pub fn store(&self, key: String, query: &str, value: &str, session_id: &str) {
        let entry = SimilarityEntry {
            key,
            value: value.to_string(),
            fingerprint: fingerprint(query),
        };

        let mut partitions = self.partitions.write();
        let entries = partitions.touch(session_id);
        entries.retain(|e| e.key != entry.key);
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn session_len(&self, session_id: &str) -> usize {
        self.partitions
            .read()
            .get(session_id)
            .map_or(0, VecDeque::len)
    }

    pub fn session_count(&self) -> usize {
        self.partitions.read().len()
    }

    /// Drops partitions of sessions idle longer than `idle`.
    pub fn prune_idle(&self, idle: Duration) -> usize {
        self.partitions.write().prune_idle(idle)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
