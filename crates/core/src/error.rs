//! Unified error types for the analytics pipeline.
//!
//! Error codes:
//! - DECODE_001-002: Payload decoding errors (dropped, never redelivered)
//! - DB_001: Store write errors (message left for redelivery)
//! - BUS_001: Message bus connection errors
//! - QUERY_001: Aggregate query errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Decode error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorCode {
    /// DECODE_001: Malformed payload
    Malformed,
    /// DECODE_002: Identifier is not a valid UUID
    InvalidId,
}

impl DecodeErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed => "DECODE_001",
            Self::InvalidId => "DECODE_002",
        }
    }
}

/// Unified error type for the analytics pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload could not be decoded into a typed event.
    #[error("[DECODE_001] decode error: {0}")]
    Decode(String),

    /// An identifier field did not parse.
    #[error("[DECODE_002] invalid identifier in {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },

    /// Store write failed.
    #[error("[DB_001] persistence error: {0}")]
    Persistence(String),

    /// Message bus unreachable.
    #[error("[BUS_001] connection error: {0}")]
    Connection(String),

    /// Store read failed or timed out.
    #[error("[QUERY_001] query error: {0}")]
    Query(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_id(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidId {
            field,
            value: value.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the failed operation should be attempted again via redelivery.
    ///
    /// Only store writes qualify: a payload that failed to decode once will
    /// fail the same way on every delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Whether this error belongs to the decode class.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidId { .. } | Self::Serialization(_)
        )
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Decode(_) => 400,
            Self::InvalidId { .. } => 400,
            Self::Serialization(_) => 400,
            Self::Persistence(_) => 500,
            Self::Connection(_) => 503,
            Self::Query(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Decode(_) => Some(DecodeErrorCode::Malformed.code()),
            Self::InvalidId { .. } => Some(DecodeErrorCode::InvalidId.code()),
            Self::Persistence(_) => Some("DB_001"),
            Self::Connection(_) => Some("BUS_001"),
            Self::Query(_) => Some("QUERY_001"),
            _ => None,
        }
    }
}
