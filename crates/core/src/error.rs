/// Domain-level errors shared by every crate in the workspace.
///
/// `SessionNotFound` deliberately covers expired, consumed, never-created and
/// wrong-flow QR sessions alike so callers cannot probe which identifiers
/// ever existed.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a client may retry the same request without new user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}
