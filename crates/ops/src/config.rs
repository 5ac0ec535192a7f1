//! Configuration for the operations layer.

use std::path::PathBuf;
use std::time::Duration;

/// Default backend URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default processing-status poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest accepted poll interval. A zero interval would refetch the dive
/// back to back.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for connecting to a divemedia backend.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// Backend base URL (e.g. `http://localhost:8000`).
    pub api_url: String,
    /// Auth service base URL. Required for `login`.
    pub auth_url: Option<String>,
    /// Public (anon) key of the auth service.
    pub auth_key: Option<String>,
    /// Pre-issued bearer token. Bypasses the auth service entirely.
    pub access_token: Option<String>,
    /// File where a signed-in session is persisted between runs.
    pub session_file: Option<PathBuf>,
    /// Request timeout for backend calls.
    pub timeout: Option<Duration>,
    /// Delay between processing-status fetches.
    pub poll_interval: Duration,
}

impl OpsConfig {
    /// Create a new configuration with defaults.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            auth_url: None,
            auth_key: None,
            access_token: None,
            session_file: None,
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `DIVEMEDIA_API_URL` (defaults to `http://localhost:8000`)
    /// - `DIVEMEDIA_AUTH_URL` (optional)
    /// - `DIVEMEDIA_AUTH_KEY` (optional)
    /// - `DIVEMEDIA_ACCESS_TOKEN` (optional)
    /// - `DIVEMEDIA_SESSION_FILE` (optional)
    /// - `DIVEMEDIA_TIMEOUT_SECS` (optional, default 30)
    /// - `DIVEMEDIA_POLL_INTERVAL_SECS` (optional, default 10)
    ///
    /// Zero and unparsable durations are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|&n| n > 0)
                .map(Duration::from_secs)
        };

        Self {
            api_url: lookup("DIVEMEDIA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_url: lookup("DIVEMEDIA_AUTH_URL"),
            auth_key: lookup("DIVEMEDIA_AUTH_KEY"),
            access_token: lookup("DIVEMEDIA_ACCESS_TOKEN"),
            session_file: lookup("DIVEMEDIA_SESSION_FILE").map(PathBuf::from),
            timeout: secs("DIVEMEDIA_TIMEOUT_SECS"),
            poll_interval: secs("DIVEMEDIA_POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Override the auth service.
    #[must_use]
    pub fn with_auth(mut self, auth_url: impl Into<String>, auth_key: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self.auth_key = Some(auth_key.into());
        self
    }

    /// Override the access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Override the session file.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Override the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the poll interval, raised to [`MIN_POLL_INTERVAL`] if shorter.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
