//! Outbound half of a client connection.
//!
//! A single writer task owns the socket; everything else sends through a cloneable
//! [`ConnectionSink`]. Once the writer reports the peer gone, every later send fails
//! fast with [`TransportError::Closed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Binary(Vec<u8>),
    Pong(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug)]
pub struct ConnectionSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    closed: Arc<AtomicBool>,
}

impl ConnectionSink {
    /// Creates a sink and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    pub fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx.send(message).map_err(|_| {
            self.mark_closed();
            TransportError::Closed
        })
    }

    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.send(OutboundMessage::Text(text))
    }

    pub fn send_binary(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.send(OutboundMessage::Binary(data))
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        let text = serde_json::to_string(value)?;
        self.send_text(text)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
