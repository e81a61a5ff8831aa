//! Per-session partitions shared by the L2 and L3 tiers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Partition<T> {
    items: T,
    touched: Instant,
}

/// Session id → partition, bounded in count and aged out by idle time.
///
/// Past `max_sessions`, the least recently written session is dropped.
#[derive(Debug)]
pub struct SessionPartitions<T> {
    map: HashMap<String, Partition<T>>,
    max_sessions: usize,
}

impl<T: Default> SessionPartitions<T> {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            map: HashMap::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&T> {
        self.map.get(session_id).map(|p| &p.items)
    }

    /// Partition for a write, created on first use. Marks the session active.
    pub fn touch(&mut self, session_id: &str) -> &mut T {
        let now = Instant::now();
        if !self.map.contains_key(session_id) && self.map.len() >= self.max_sessions {
            let stalest = self
                .map
                .iter()
                .min_by_key(|(_, p)| p.touched)
                .map(|(id, _)| id.clone());
            if let Some(stalest) = stalest {
                self.map.remove(&stalest);
            }
        }

        let partition = self
            .map
            .entry(session_id.to_string())
            .or_insert_with(|| Partition {
                items: T::default(),
                touched: now,
            });
        partition.touched = now;
        &mut partition.items
    }

    /// Drops sessions not written for longer than `idle`. Returns how many were dropped.
    pub fn prune_idle(&mut self, idle: Duration) -> usize {
        let before = self.map.len();
        self.map.retain(|_, p| p.touched.elapsed() <= idle);
        before - self.map.len()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
