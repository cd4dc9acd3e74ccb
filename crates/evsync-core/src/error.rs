//! Error types for evsync
//!
//! Two families:
//! - `SourceError`: a failed fetch from the remote collection. Cloneable so the
//!   synchronizer can keep the last one around for the view to render.
//! - `SyncError`: configuration and setup failures surfaced to the caller.

use std::path::PathBuf;

/// Classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    /// Could not reach the remote endpoint
    Transport,
    /// Remote returned 404
    NotFound,
    /// Remote rejected the credentials (401/403)
    Auth,
    /// Remote rejected the request (other 4xx)
    Validation,
    /// Remote failed (5xx)
    Server,
    /// Remote answered 2xx with an error envelope
    Api,
    /// Response body could not be decoded
    Decode,
}

impl SourceErrorKind {
    /// Classify an HTTP status code
    #[must_use]
    pub fn from_status(code: u16) -> Self {
        match code {
            404 => Self::NotFound,
            401 | 403 => Self::Auth,
            400..=499 => Self::Validation,
            _ => Self::Server,
        }
    }
}

/// Failure of a single fetch from a [`RecordSource`](crate::RecordSource)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct SourceError {
    /// What went wrong
    pub kind: SourceErrorKind,
    /// HTTP status, when there was a response
    pub status: Option<u16>,
    /// Human-readable detail
    pub message: String,
}

impl SourceError {
    /// Create a new source error
    pub fn new(kind: SourceErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Transport-level failure without a response
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, None, message)
    }

    /// Body could not be decoded
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Decode, None, message)
    }

    /// Whether the next poll could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Transport | SourceErrorKind::Server
        )
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::decode(e.to_string())
    }
}

/// Configuration and setup errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A configuration value is out of range or missing
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(SourceErrorKind::from_status(404), SourceErrorKind::NotFound);
        assert_eq!(SourceErrorKind::from_status(401), SourceErrorKind::Auth);
        assert_eq!(SourceErrorKind::from_status(403), SourceErrorKind::Auth);
        assert_eq!(SourceErrorKind::from_status(422), SourceErrorKind::Validation);
        assert_eq!(SourceErrorKind::from_status(503), SourceErrorKind::Server);
    }

    #[test]
    fn transient_errors() {
        assert!(SourceError::transport("connection refused").is_transient());
        assert!(!SourceError::decode("expected array").is_transient());
        assert!(SourceError::new(SourceErrorKind::Server, Some(502), "bad gateway").is_transient());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = SourceError::new(SourceErrorKind::NotFound, Some(404), "case not found");
        assert_eq!(err.to_string(), "NotFound: case not found");
    }
}
