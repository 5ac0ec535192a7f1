//! Error types for the divemedia client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when using the divemedia client.
#[derive(Debug, Error)]
pub enum Error {
    /// No authenticated session is available. Raised before any network call.
    #[error("no active session")]
    NoSession,

    /// The backend answered 404. Callers may treat this as "does not exist yet".
    #[error("404")]
    NotFound,

    /// The backend answered with any other non-2xx status.
    #[error("request failed with HTTP {status}: {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// Transport-level failure (DNS, connect, reset, timeout).
    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Request body serialization error.
    #[error("failed to serialize request: {0}")]
    Serialization(String),

    /// Response deserialization error.
    #[error("failed to deserialize response: {0}")]
    Deserialization(String),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a photo or a video.
    #[error("unsupported media type {mime} for {}", path.display())]
    UnsupportedMedia {
        /// Offending file.
        path: PathBuf,
        /// Detected MIME type.
        mime: String,
    },

    /// The auth provider rejected a sign-in, refresh or sign-out.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An upload batch finished with at least one failed file. Files that were
    /// registered stay registered.
    #[error("upload incomplete: {registered} registered, {failed} failed")]
    UploadIncomplete {
        /// Number of files registered with the backend.
        registered: usize,
        /// Number of files whose chain failed.
        failed: usize,
    },
}

impl Error {
    /// Returns `true` if this error is retryable.
    ///
    /// Connection errors and HTTP 5xx responses return `true`.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the backend answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` if the caller has to sign in first.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::NoSession | Self::RequestFailed { status: 401, .. }
        )
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::RequestFailed { status, .. } => Some(*status),
            Self::Connection(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
