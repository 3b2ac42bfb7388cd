//! Error types for value parsing in greenbox-types.

use thiserror::Error;

/// Errors that can occur when parsing Greenbox identifiers and labels.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The string does not name a known sensor.
    #[error("Unknown sensor kind: {0}")]
    UnknownSensorKind(String),

    /// The string does not name a known history period.
    #[error("Unknown period: {0} (expected 24h, 7d or 30d)")]
    UnknownPeriod(String),

    /// The string does not name a known notification kind.
    #[error("Unknown notification kind: {0}")]
    UnknownNotificationKind(String),

    /// The string does not name a known priority.
    #[error("Unknown priority: {0}")]
    UnknownPriority(String),

    /// Free-form invalid value.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using greenbox-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
