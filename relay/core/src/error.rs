//! Relay Errors
//!
//! One error type for the whole relay path. Every failure that can cross the
//! relay boundary maps to exactly one of these kinds, so the HTTP layer and the
//! client can turn them into structured responses instead of raw panics.

use thiserror::Error;

/// Errors produced by the relay core
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Input rejected before any network call
    #[error("validation failed: {0}")]
    Validation(String),

    /// Upstream unreachable, non-2xx, malformed, or failed mid-stream
    #[error("{}", upstream_message(.status, .message))]
    UpstreamRequestFailed {
        /// HTTP status returned by the upstream, if one was received
        status: Option<u16>,
        /// Upstream body, status text, or transport error description
        message: String,
    },

    /// The caller cancelled the stream (terminal state, not a failure)
    #[error("stream aborted by caller")]
    StreamAborted,

    /// Stored client state could not be parsed
    #[error("malformed persisted state: {0}")]
    MalformedPersistedState(String),

    /// The PDF export proxy failed
    #[error("Failed to export PDF: {0}")]
    ExportFailed(String),

    /// Missing credential or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("upstream request failed ({code}): {message}"),
        None => format!("upstream request failed: {message}"),
    }
}

impl RelayError {
    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Upstream failure with an HTTP status
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamRequestFailed {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Upstream failure without a status (transport, parse, mid-stream)
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamRequestFailed {
            status: None,
            message: message.into(),
        }
    }

    /// Whether this is a normal terminal state rather than a failure
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::StreamAborted)
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamRequestFailed {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result alias used throughout the relay core
pub type RelayResult<T> = Result<T, RelayError>;
