//! Error types for the disc organizer.

use crate::models::record::ErrorKind;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the disc organizer.
#[derive(Error, Debug)]
pub enum Error {
    // Structural errors
    #[error("Invalid disc structure: {path}")]
    InvalidDiscStructure { path: String },

    // Resource errors
    #[error("Insufficient space: {required} bytes required, {available} bytes available")]
    InsufficientSpace { required: u64, available: u64 },

    // Remux errors
    #[error("Remux source unreadable (exit code {code})")]
    RetryableSource { code: i32 },

    #[error("Remux tool license or key expired (exit code {code})")]
    FatalLicense { code: i32 },

    #[error("Remux failed with exit code {code}")]
    UnknownRemux { code: i32, output_tail: Vec<String> },

    #[error("Remux timed out after {secs}s")]
    RemuxTimeout { secs: u64 },

    #[error("Remux produced no tracks in {dir}")]
    EmptyOutput { dir: String },

    #[error("Remux cancelled")]
    Cancelled,

    // Placement errors
    #[error("Placement incomplete: {}", failures.join("; "))]
    PlacementIncomplete { failures: Vec<String> },

    // Tooling errors
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// The persisted kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDiscStructure { .. } => ErrorKind::InvalidDiscStructure,
            Error::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            Error::RetryableSource { .. } => ErrorKind::RetryableSourceError,
            Error::FatalLicense { .. } => ErrorKind::FatalLicenseError,
            Error::UnknownRemux { .. } => ErrorKind::UnknownRemuxError,
            Error::RemuxTimeout { .. } => ErrorKind::RemuxTimeout,
            Error::EmptyOutput { .. } => ErrorKind::EmptyOutputError,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::PlacementIncomplete { .. } => ErrorKind::PlacementIncomplete,
            Error::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Error::Io(_) | Error::PathNotFound(_) | Error::NotADirectory(_) => ErrorKind::Io,
            Error::TmdbApiKeyMissing
            | Error::Config(_)
            | Error::Http(_)
            | Error::Json(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Errors that halt the whole run, not just the current disc.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalLicense { .. })
    }

    /// Errors the orchestrator may retry within a run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RetryableSource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_and_retryable_classes() {
        assert!(Error::FatalLicense { code: 251 }.is_fatal());
        assert!(!Error::FatalLicense { code: 251 }.is_retryable());
        assert!(Error::RetryableSource { code: 10 }.is_retryable());
        assert!(!Error::RetryableSource { code: 10 }.is_fatal());
        assert!(!Error::RemuxTimeout { secs: 5 }.is_fatal());
        assert!(!Error::RemuxTimeout { secs: 5 }.is_retryable());
        assert!(!Error::EmptyOutput { dir: "x".into() }.is_fatal());
        assert!(!Error::ToolNotFound("makemkvcon".into()).is_fatal());
        assert!(!Error::ToolNotFound("makemkvcon".into()).is_retryable());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::UnknownRemux { code: 3, output_tail: vec![] }.kind(),
            ErrorKind::UnknownRemuxError
        );
        assert_eq!(
            Error::PlacementIncomplete { failures: vec!["a".into()] }.kind(),
            ErrorKind::PlacementIncomplete
        );
        assert_eq!(
            Error::InsufficientSpace { required: 2, available: 1 }.kind(),
            ErrorKind::InsufficientSpace
        );
    }
}
