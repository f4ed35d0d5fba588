//! Shared error types.

use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the chatify backend on non-success responses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Attempt to pull a user-facing message out of an error response body.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    parsed.message.filter(|m| !m.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// Text suitable for a notification, falling back to `fallback` when the
    /// backend gave no explanation.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http { body, .. } => {
                try_error_message(body).unwrap_or_else(|| fallback.to_string())
            }
            _ => fallback.to_string(),
        }
    }
}

/// Failure to decode an inbound websocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown frame type `{0}`")]
    UnknownType(String),
    #[error("malformed frame: {0}")]
    Malformed(String),
}
