//! Error types for greenbox-core.
//!
//! The taxonomy follows how the engine recovers from each failure:
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | [`Error::Transport`] | gateway calls | offline fallback (cache, then synthetic) |
//! | [`Error::Timeout`] | gateway calls bounded by the scheduler | same as transport |
//! | [`Error::MalformedData`] | payload decoding, cache reads | substitute a safe default |
//! | [`Error::NoActiveEntity`] | scheduler with nothing selected | offline fallback |
//! | [`Error::EmptyInput`] | normalizer | caller substitutes fallback data first |
//!
//! Only access-code validation surfaces errors to the user; telemetry
//! failures are absorbed by the scheduler.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the sync engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Gateway unreachable or returned a non-success status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be decoded or lacks expected fields.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// The normalizer was handed an empty series.
    #[error("Cannot normalize an empty series")]
    EmptyInput,

    /// No entity is selected, so there is nothing to scope requests to.
    #[error("No active entity selected")]
    NoActiveEntity,

    /// A gateway call did not resolve in time.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Local persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] greenbox_store::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this failure means the gateway could not be reached in time.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedData(e.to_string())
    }
}

/// Result type alias using greenbox-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
