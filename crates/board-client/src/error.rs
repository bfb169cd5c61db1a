use thiserror::Error;

/// Failure raised by a [`TableStore`](crate::TableStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rejected by store (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized(_))
    }
}

/// Uniform error shape returned by every gateway operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation}: {message}")]
pub struct RemoteError {
    /// Gateway operation that failed (e.g. "create_project")
    pub operation: &'static str,
    pub message: String,
    /// The session was rejected and has been signed out
    pub unauthorized: bool,
}

impl RemoteError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            unauthorized: false,
        }
    }

    pub fn not_found(operation: &'static str, what: impl std::fmt::Display) -> Self {
        Self::new(operation, format!("{what} not found"))
    }

    /// Message suitable for the user, or `fallback` when the backend gave none.
    pub fn user_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        let message = self.message.trim();
        if message.is_empty() {
            fallback
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_falls_back_when_empty() {
        let err = RemoteError::new("create_project", "  ");
        assert_eq!(err.user_message("Failed to create project"), "Failed to create project");

        let err = RemoteError::new("create_project", "duplicate name");
        assert_eq!(err.user_message("Failed to create project"), "duplicate name");
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(StoreError::Unauthorized("expired".into()).is_unauthorized());
        assert!(!StoreError::Rejected {
            status: 500,
            message: "boom".into()
        }
        .is_unauthorized());
    }
}
