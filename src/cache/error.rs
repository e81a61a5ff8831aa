use thiserror::Error;

/// Cache tier failures. Lookups never surface these to callers; a failing tier is
/// logged and skipped.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("shared store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("shared store operation failed for key '{key}': {reason}")]
    OperationFailed { key: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
