use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Inbound message was not a valid token event.
    #[error("invalid message: {reason}")]
    Validation { reason: String },

    #[error("token must not be empty")]
    EmptyToken,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type SessionResult<T> = Result<T, SessionError>;
