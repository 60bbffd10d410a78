// Error taxonomy for the push notification core
//
// Nothing here is ever surfaced to the end user: components catch these,
// log them and degrade to "notifications may not work this session".

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Listener unavailable: {0}")]
    ListenerUnavailable(String),

    #[error("Push token must be a non-empty string")]
    InvalidToken,

    #[error("Platform messaging error: {0}")]
    Platform(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
}

impl PushError {
    /// Failures that resolve themselves on the next triggering event
    /// (foreground transition, app restart).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PushError::Network(_) | PushError::Storage(_) | PushError::InvalidResponse(_)
        )
    }

    /// Failures that disable push for the rest of this session.
    pub fn is_terminal_for_session(&self) -> bool {
        matches!(
            self,
            PushError::PermissionDenied | PushError::ListenerUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        PushError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        PushError::Storage(format!("JSON error: {}", err))
    }
}

/// Result type alias for push core operations.
pub type PushResult<T> = Result<T, PushError>;
