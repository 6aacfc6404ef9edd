//! Error types for the Mailin API client.
//!
//! # Design
//! These errors describe what went wrong *below* the facade: the transport
//! could not deliver a query, the service answered with a non-2xx status, or a
//! payload could not be encoded. The facade never returns them to callers.
//! It folds them into a failed `Response` so every operation reports failure
//! through its usual sentinel (`None`, `false`, or an empty collection).

use thiserror::Error;

/// Errors raised by transports, configuration loading, and payload encoding.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connection refused, timeout,
    /// unreadable body, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// A payload could not be encoded to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
