//! Error types for image-dl
//!
//! Errors in this module never reach the caller of
//! [`ImageDownloader::save`](crate::ImageDownloader::save): the pipeline turns
//! every failure into a [`SaveStatus`](crate::SaveStatus). They are used by the
//! helper APIs (configuration, transports, tag loading, persistence) and
//! internally to decide which status an output ends up with.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for image-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for image-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "save.size_fallbacks")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure that did not come from the HTTP client
    #[error("transport error: {0}")]
    Transport(String),

    /// Tag metadata could not be loaded
    #[error("tag load failed: {0}")]
    TagLoad(String),

    /// A resolved output path cannot be written to
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why the path is unusable
        reason: String,
    },

    /// Target file already exists and the collision action is Skip
    #[error("file already exists: {path}")]
    FileExists {
        /// The existing file
        path: PathBuf,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Trait for errors that can be classified as retryable or not
///
/// The pipeline never retries on its own; this classification is surfaced in
/// logs so callers with a retry policy can decide whether to run `save()` again.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation could be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Transport(msg) => {
                msg.contains("timeout") || msg.contains("connection") || msg.contains("temporary")
            }
            Error::Config { .. }
            | Error::TagLoad(_)
            | Error::InvalidPath { .. }
            | Error::FileExists { .. }
            | Error::Serialization(_)
            | Error::Cancelled
            | Error::Other(_) => false,
        }
    }
}
