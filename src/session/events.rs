use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::engine::Answer;
use super::error::SessionError;

/// Inbound `{"token": "...", "request_id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientEvent {
    pub token: String,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
}

pub fn parse_client_event(raw: &str) -> Result<ClientEvent, SessionError> {
    serde_json::from_str(raw).map_err(|e| SessionError::Validation {
        reason: e.to_string(),
    })
}

/// Outbound JSON events, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionEstablished {
        session_id: String,
        timestamp: String,
    },
    /// Acknowledges a token.
    Typing {
        question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        timestamp: String,
    },
    /// Answer to the text accumulated so far.
    Preview {
        content: String,
        question: String,
        source: String,
        processing_time: f64,
        timestamp: String,
    },
    /// The single authoritative answer of an utterance.
    Complete {
        content: String,
        question: String,
        source: String,
        request_id: String,
        processing_time: f64,
        timestamp: String,
    },
    /// An in-flight attempt was superseded.
    Aborted { question: String, timestamp: String },
    Error { content: String, timestamp: String },
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Seconds, rounded to milliseconds.
fn seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

impl ServerEvent {
    pub fn connection_established(session_id: &str) -> Self {
        Self::ConnectionEstablished {
            session_id: session_id.to_string(),
            timestamp: now(),
        }
    }

    pub fn typing(question: &str, request_id: Option<String>) -> Self {
        Self::Typing {
            question: question.to_string(),
            request_id,
            timestamp: now(),
        }
    }

    pub fn preview(answer: &Answer, question: &str, elapsed: Duration) -> Self {
        Self::Preview {
            content: answer.content.clone(),
            question: question.to_string(),
            source: answer.source.label(),
            processing_time: seconds(elapsed),
            timestamp: now(),
        }
    }

    pub fn complete(answer: &Answer, question: &str, request_id: &str, elapsed: Duration) -> Self {
        Self::Complete {
            content: answer.content.clone(),
            question: question.to_string(),
            source: answer.source.label(),
            request_id: request_id.to_string(),
            processing_time: seconds(elapsed),
            timestamp: now(),
        }
    }

    pub fn aborted(question: &str) -> Self {
        Self::Aborted {
            question: question.to_string(),
            timestamp: now(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
            timestamp: now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::Typing { .. } => "typing",
            Self::Preview { .. } => "preview",
            Self::Complete { .. } => "complete",
            Self::Aborted { .. } => "aborted",
            Self::Error { .. } => "error",
        }
    }
}
