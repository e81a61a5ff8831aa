//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid chunk size {value}: must be greater than zero")]
    InvalidChunkSize { value: usize },

    #[error("unknown race strategy '{value}' (expected first_win or race_with_timeout)")]
    InvalidStrategy { value: String },

    /// A `name:model:priority:max_tokens:timeout_ms` entry could not be parsed.
    #[error("invalid provider spec '{spec}': {reason}")]
    InvalidProviderSpec { spec: String, reason: String },

    /// Real (non-mock) mode needs at least one enabled provider.
    #[error("no providers configured; set MURMUR_PROVIDERS or MURMUR_MOCK_PROVIDER=1")]
    NoProviders,
}
