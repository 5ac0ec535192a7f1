//! Error types for the operations layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the operations layer.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sign-in or sign-out was requested while a pre-issued access token is
    /// configured.
    #[error("a static access token is configured; unset DIVEMEDIA_ACCESS_TOKEN to sign in or out")]
    StaticToken,

    /// The persisted session file exists but could not be read or parsed.
    #[error("session file {}: {source}", path.display())]
    SessionFile {
        path: PathBuf,
        #[source]
        source: divemedia_client::Error,
    },

    /// Error from the underlying HTTP client.
    #[error(transparent)]
    Client(#[from] divemedia_client::Error),
}
