use std::path::PathBuf;

use board_client::RemoteError;
use board_types::ValidationError;
use thiserror::Error;

/// Why a mutation intent did not complete.
///
/// By the time one of these is returned the user has already been notified
/// and the cache restored, so callers may ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// Another submission from the same view has not settled yet
    #[error("a submission is already in flight")]
    InFlight,
}

impl MutationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, MutationError::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_cause() {
        let err = MutationError::from(ValidationError::new("name", "is required"));
        assert_eq!(err.to_string(), "validation failed: name: is required");
        assert!(err.is_validation());

        let err = MutationError::from(RemoteError::new("delete_projects", "deleted 1 of 3 projects"));
        assert_eq!(
            err.to_string(),
            "remote call failed: delete_projects: deleted 1 of 3 projects"
        );
    }
}
