use thiserror::Error;

/// Reasons a session record is rejected by the validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The user id is empty, too long, or uses characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// The session id is not a valid UUID string.
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// `expires_at` is not strictly after `created_at`.
    #[error("Expiration time must be after creation time")]
    InvalidExpiry,

    /// `last_activity` is before `created_at`.
    #[error("Last activity cannot be before creation time")]
    InvalidActivity,
}

/// The session layer's error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backing store could not be reached or rejected a command.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] redis::RedisError),

    /// A record failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The user already holds the maximum number of sessions.
    #[error("Session limit exceeded for user {user_id}: at most {limit} sessions")]
    SessionLimitExceeded { user_id: String, limit: usize },
}

/// A `Result` type that uses `SessionError` as the error type.
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<sonic_rs::Error> for SessionError {
    fn from(e: sonic_rs::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

impl SessionError {
    /// Whether the error came from the backing store rather than from the caller's input.
    pub fn is_store_error(&self) -> bool {
        matches!(self, SessionError::StoreUnavailable(_))
    }
}
