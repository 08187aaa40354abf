use std::path::PathBuf;

use thiserror::Error;

/// Errors from repository operations (used by trait definitions in chatlog-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Bad input: empty identifiers, non-positive sequence numbers.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing medium could not be reached or timed out. Retryable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

/// Errors from the session orchestrator.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The external reply generator failed; nothing was written.
    #[error("reply generation failed: {0}")]
    Generation(String),
}

/// Failure reported by an external reply or title generator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GeneratorError(pub String);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown backend kind: '{0}' (expected 'inmemory' or 'sqlite')")]
    UnknownBackend(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(RepositoryError::Unavailable("timeout".into()).is_retryable());
        assert!(!RepositoryError::Conflict("dup".into()).is_retryable());
        assert!(!RepositoryError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn test_chat_error_wraps_repository_error() {
        let err: ChatError = RepositoryError::Unavailable("pool timed out".into()).into();
        assert_eq!(err.to_string(), "storage unavailable: pool timed out");
    }

    #[test]
    fn test_unknown_backend_display() {
        let err = ConfigError::UnknownBackend("redis".to_string());
        assert!(err.to_string().contains("'redis'"));
    }
}
