use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

#[derive(Debug)]
struct LiveSession {
    connection_id: Uuid,
    cancel: CancellationToken,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub connection_id: Uuid,
    pub connected_at: DateTime<Utc>,
}

/// Live connections by session id. At most one connection per id: a newer connection
/// replaces (and cancels) the older one.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, LiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its id. Cancels any previous connection.
    pub fn register(&self, session_id: &str, cancel: CancellationToken) -> Uuid {
        let connection_id = Uuid::new_v4();
        let previous = self.sessions.write().insert(
            session_id.to_string(),
            LiveSession {
                connection_id,
                cancel,
                connected_at: Utc::now(),
            },
        );

        if let Some(previous) = previous {
            info!(
                session_id,
                replaced = %previous.connection_id,
                "Duplicate session id; closing previous connection"
            );
            previous.cancel.cancel();
        }
        connection_id
    }

    /// Removes the entry only if it still belongs to `connection_id`.
    pub fn unregister(&self, session_id: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(session_id) {
            Some(live) if live.connection_id == connection_id => {
                sessions.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut out: Vec<_> = self
            .sessions
            .read()
            .iter()
            .map(|(id, live)| SessionSummary {
                session_id: id.clone(),
                connection_id: live.connection_id,
                connected_at: live.connected_at,
            })
            .collect();
        out.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        out
    }
}
