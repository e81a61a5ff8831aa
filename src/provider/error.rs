use thiserror::Error;

/// Failures of an upstream provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("provider call cancelled")]
    Cancelled,

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("synthesis failed with status {status}")]
    SynthesisStatus { status: u16 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
