//! L3: popular question tracking with lexical-overlap matching.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use super::partitions::SessionPartitions;
use crate::constants::{
    MAX_TRACKED_SESSIONS, POPULAR_CANDIDATES, POPULAR_TABLE_CAPACITY, SESSION_POPULARITY_WEIGHT,
};
use crate::hashing::{hash_to_u64, normalize_query};

/// Jaccard similarity of the whitespace-separated word sets.
pub fn lexical_overlap(a: &str, b: &str) -> f32 {
    let a_norm = normalize_query(a);
    let b_norm = normalize_query(b);
    let a_words: HashSet<&str> = a_norm.split_whitespace().collect();
    let b_words: HashSet<&str> = b_norm.split_whitespace().collect();

    let union = a_words.union(&b_words).count();
    if union == 0 {
        return 0.0;
    }
    a_words.intersection(&b_words).count() as f32 / union as f32
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PopularQuestion {
    pub question: String,
    pub answer: String,
    pub count: u64,
}

#[derive(Debug)]
struct Counters {
    global: HashMap<u64, PopularQuestion>,
    /// Insertion-ordered so the oldest question is evicted first.
    sessions: SessionPartitions<Vec<(u64, PopularQuestion)>>,
    hours: HashMap<u32, HashMap<u64, PopularQuestion>>,
}

impl Counters {
    fn new(max_sessions: usize) -> Self {
        Self {
            global: HashMap::new(),
            sessions: SessionPartitions::new(max_sessions),
            hours: HashMap::new(),
        }
    }
}

/// Question/answer frequency counters: per session, global and per hour of day.
#[derive(Debug)]
pub struct PopularityTracker {
    threshold: f32,
    per_session_capacity: usize,
    table_capacity: usize,
    counters: RwLock<Counters>,
}

impl PopularityTracker {
    pub fn new(threshold: f32, per_session_capacity: usize) -> Self {
        Self {
            threshold,
            per_session_capacity: per_session_capacity.max(1),
            table_capacity: POPULAR_TABLE_CAPACITY,
            counters: RwLock::new(Counters::new(MAX_TRACKED_SESSIONS)),
        }
    }

    /// Caps the global table and each hour bucket at `capacity` questions.
    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity.max(1);
        self
    }

    /// Caps how many sessions keep their own counters.
    pub fn with_max_sessions(self, max_sessions: usize) -> Self {
        Self {
            counters: RwLock::new(Counters::new(max_sessions)),
            ..self
        }
    }

    /// Counts one occurrence of `question` answered with `answer` at `hour` (0-23).
    pub fn record(&self, session_id: &str, question: &str, answer: &str, hour: u32) {
        let id = hash_to_u64(normalize_query(question).as_bytes());
        let mut counters = self.counters.write();

        bump(&mut counters.global, id, question, answer, self.table_capacity);
        let bucket = counters.hours.entry(hour % 24).or_default();
        bump(bucket, id, question, answer, self.table_capacity);

        let session = counters.sessions.touch(session_id);
        match session.iter_mut().find(|(k, _)| *k == id) {
            Some((_, pattern)) => {
                pattern.count += 1;
                pattern.answer = answer.to_string();
            }
            None => {
                session.push((
                    id,
                    PopularQuestion {
                        question: question.to_string(),
                        answer: answer.to_string(),
                        count: 1,
                    },
                ));
                if session.len() > self.per_session_capacity {
                    session.remove(0);
                }
            }
        }
    }

    /// Session questions (weighted ×2) merged with global ones, most popular first.
    pub fn popular(&self, session_id: &str, limit: usize) -> Vec<PopularQuestion> {
        let counters = self.counters.read();
        let mut scored: HashMap<u64, (u64, PopularQuestion)> = HashMap::new();

        if let Some(session) = counters.sessions.get(session_id) {
            for (id, pattern) in session {
                scored.insert(*id, (pattern.count * SESSION_POPULARITY_WEIGHT, pattern.clone()));
            }
        }
        for (id, pattern) in &counters.global {
            scored
                .entry(*id)
                .and_modify(|(score, _)| *score += pattern.count)
                .or_insert_with(|| (pattern.count, pattern.clone()));
        }

        let mut ranked: Vec<_> = scored.into_values().collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.question.cmp(&b.1.question)));
        ranked.into_iter().take(limit).map(|(_, p)| p).collect()
    }

    /// Drops counters of sessions idle longer than `idle`. Global and hourly counts stay.
    pub fn prune_idle(&self, idle: Duration) -> usize {
        self.counters.write().sessions.prune_idle(idle)
    }

    pub fn session_count(&self) -> usize {
        self.counters.read().sessions.len()
    }

    /// Most asked questions during `hour`.
    pub fn trending(&self, hour: u32, limit: usize) -> Vec<PopularQuestion> {
        let counters = self.counters.read();
        let mut ranked: Vec<_> = counters
            .hours
            .get(&(hour % 24))
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default();
        ranked.sort_by(|a: &PopularQuestion, b| {
            b.count.cmp(&a.count).then_with(|| a.question.cmp(&b.question))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Answer of the first popular candidate whose overlap with `query` exceeds the threshold.
    pub fn lookup(&self, query: &str, session_id: &str) -> Option<(String, f32)> {
        self.popular(session_id, POPULAR_CANDIDATES)
            .into_iter()
            .map(|p| {
                let overlap = lexical_overlap(query, &p.question);
                (p, overlap)
            })
            .find(|(_, overlap)| *overlap > self.threshold)
            .map(|(p, overlap)| (p.answer, overlap))
    }
}

/// Counts `id` in `table`; past `capacity` the least counted other question is dropped.
fn bump(
    table: &mut HashMap<u64, PopularQuestion>,
    id: u64,
    question: &str,
    answer: &str,
    capacity: usize,
) {
    table
        .entry(id)
        .and_modify(|p| {
            p.count += 1;
            p.answer = answer.to_string();
        })
        .or_insert_with(|| PopularQuestion {
            question: question.to_string(),
            answer: answer.to_string(),
            count: 1,
        });

    if table.len() > capacity {
        let least = table
            .iter()
            .filter(|(k, _)| **k != id)
            .min_by_key(|(_, p)| p.count)
            .map(|(k, _)| *k);
        if let Some(least) = least {
            table.remove(&least);
        }
    }
}
