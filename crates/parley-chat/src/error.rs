use thiserror::Error;

/// Failures surfaced by the messaging core. Each carries a user-facing message;
/// the HTTP layer picks the status code.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed, missing or oversized input
    #[error("{0}")]
    Validation(String),

    /// No usable caller identity
    #[error("{0}")]
    NotAuthorized(String),

    /// Identity is known but not allowed to do this
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent, or the caller is not a member of its thread
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Store failure or timeout; safe to retry
    #[error("{0}")]
    Transient(String),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
