use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::engine::Answer;
use crate::prefix::SpeechSegment;
use crate::transport::ConnectionSink;

/// Lifecycle of one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Accumulating,
    Finalizing,
}

/// A published attempt result.
#[derive(Debug, Clone)]
pub struct CompletedAttempt {
    pub seq: u64,
    pub question: String,
    pub answer: Answer,
}

#[derive(Debug, Default)]
struct PreparedSpeech {
    seq: u64,
    segments: Vec<SpeechSegment>,
}

#[derive(Debug, Default)]
struct PublishGate {
    latest_seq: u64,
    completed: Option<CompletedAttempt>,
    prepared: PreparedSpeech,
}

/// State shared between a session's controller and its background tasks.
///
/// Sequence bumps and result publication both happen under one lock, so a result is
/// either published before a newer token is registered or discarded after it.
pub struct SessionShared {
    pub session_id: String,
    pub sink: ConnectionSink,
    gate: Mutex<PublishGate>,
}

impl std::fmt::Debug for SessionShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionShared")
            .field("session_id", &self.session_id)
            .field("latest_seq", &self.latest_seq())
            .finish_non_exhaustive()
    }
}

impl SessionShared {
    pub fn new(session_id: impl Into<String>, sink: ConnectionSink) -> Self {
        Self {
            session_id: session_id.into(),
            sink,
            gate: Mutex::new(PublishGate::default()),
        }
    }

    /// Registers a new token (or utterance boundary) and returns its sequence number.
    pub fn next_seq(&self) -> u64 {
        let mut gate = self.gate.lock();
        gate.latest_seq += 1;
        gate.latest_seq
    }

    pub fn latest_seq(&self) -> u64 {
        self.gate.lock().latest_seq
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.gate.lock().latest_seq == seq
    }

    /// Sends `event` and records `completed` iff its sequence is still the latest.
    pub fn publish<T: Serialize>(&self, completed: CompletedAttempt, event: &T) -> bool {
        let mut gate = self.gate.lock();
        if gate.latest_seq != completed.seq {
            return false;
        }
        if let Err(e) = self.sink.send_json(event) {
            debug!(seq = completed.seq, error = %e, "Preview not delivered");
        }
        gate.completed = Some(completed);
        true
    }

    pub fn completed_for(&self, seq: u64) -> Option<CompletedAttempt> {
        self.gate
            .lock()
            .completed
            .as_ref()
            .filter(|c| c.seq == seq)
            .cloned()
    }

    pub fn prepared_segments(&self) -> Vec<SpeechSegment> {
        self.gate.lock().prepared.segments.clone()
    }

    /// Stores speech synthesized for a preview, only while that preview is current.
    pub fn store_preview_speech(&self, seq: u64, segments: Vec<SpeechSegment>) -> bool {
        let mut gate = self.gate.lock();
        if gate.latest_seq != seq {
            return false;
        }
        gate.prepared = PreparedSpeech { seq, segments };
        true
    }

    /// Stores delivered speech unless newer preview speech already replaced it.
    pub fn store_delivered_speech(&self, seq: u64, segments: Vec<SpeechSegment>) {
        let mut gate = self.gate.lock();
        if gate.prepared.seq <= seq {
            gate.prepared = PreparedSpeech { seq, segments };
        }
    }
}
