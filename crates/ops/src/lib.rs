//! Common operations layer for the divemedia CLI.
//!
//! Wraps [`divemedia_client::DiveMediaClient`] with configuration management
//! and session bootstrap.

mod config;
mod error;

pub use config::{DEFAULT_API_URL, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, OpsConfig};
pub use error::OpsError;

use std::path::PathBuf;
use std::sync::Arc;

use divemedia_client::{
    DiveMediaClient, DiveMediaClientBuilder, PollConfig, PollerHandle, ProcessingPoller, Session,
    SessionProvider, SessionStore, StaticSession, UploadProgress, UploadQueue, UploadReport,
};
use tracing::{debug, info};

/// Re-export client and core types for consumers.
pub use divemedia_client;
pub use divemedia_core;

/// High-level operations client for divemedia.
///
/// Holds the HTTP client together with the session store it authenticates
/// with, so commands can sign in and out as well as call the backend.
#[derive(Clone)]
pub struct OpsClient {
    inner: Arc<DiveMediaClient>,
    sessions: Option<SessionStore>,
    session_file: Option<PathBuf>,
    poll_interval: std::time::Duration,
}

impl OpsClient {
    /// Create a new operations client from configuration.
    ///
    /// A configured access token wins over the auth service. Otherwise a
    /// [`SessionStore`] is used; call [`OpsClient::restore_session`] to pick
    /// up a session persisted by an earlier `login`.
    pub fn from_config(config: &OpsConfig) -> Result<Self, OpsError> {
        let mut builder = DiveMediaClientBuilder::new(&config.api_url);

        if let Some(ref timeout) = config.timeout {
            builder = builder.timeout(*timeout);
        }

        let sessions = if let Some(ref token) = config.access_token {
            builder = builder.session_provider(Arc::new(StaticSession::from_token(token)));
            None
        } else {
            let mut store = match (&config.auth_url, &config.auth_key) {
                (Some(url), Some(key)) => SessionStore::new(url, key),
                (Some(_), None) => {
                    return Err(OpsError::Configuration(
                        "DIVEMEDIA_AUTH_URL is set but DIVEMEDIA_AUTH_KEY is missing".into(),
                    ));
                }
                _ => SessionStore::offline(),
            };
            if let Some(ref path) = config.session_file {
                store = store.with_persistence(path);
            }
            builder = builder.session_provider(Arc::new(store.clone()) as Arc<dyn SessionProvider>);
            Some(store)
        };

        let client = builder
            .build()
            .map_err(|e| OpsError::Configuration(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(client),
            session_file: sessions.as_ref().and(config.session_file.clone()),
            sessions,
            poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
        })
    }

    /// Access the underlying HTTP client directly.
    ///
    /// Use this when you need to call a specific client method that
    /// is not wrapped by the ops layer.
    pub fn client(&self) -> &DiveMediaClient {
        &self.inner
    }

    /// The session store, unless a static access token is configured.
    pub fn session_store(&self) -> Option<&SessionStore> {
        self.sessions.as_ref()
    }

    /// Load the persisted session, if any.
    pub async fn restore_session(&self) -> Result<Option<Session>, OpsError> {
        let Some(store) = &self.sessions else {
            return Ok(None);
        };
        store.load().await.map_err(|source| OpsError::SessionFile {
            path: self.session_file.clone().unwrap_or_default(),
            source,
        })
    }

    fn auth_store(&self) -> Result<&SessionStore, OpsError> {
        self.sessions.as_ref().ok_or(OpsError::StaticToken)
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, OpsError> {
        Ok(self
            .auth_store()?
            .sign_in_with_password(email, password)
            .await?)
    }

    /// URL to open in a browser for OAuth sign-in.
    pub fn oauth_url(&self, provider: &str, redirect_to: &str) -> Result<String, OpsError> {
        Ok(self
            .auth_store()?
            .oauth_authorize_url(provider, redirect_to)?)
    }

    /// Sign out and forget the persisted session.
    pub async fn logout(&self) -> Result<(), OpsError> {
        Ok(self.auth_store()?.sign_out().await?)
    }

    /// The session calls would currently be made with.
    pub async fn whoami(&self) -> Option<Session> {
        self.inner.current_session().await
    }

    /// Build an upload queue from files on disk.
    ///
    /// Every path is validated before anything is sent, so an unreadable or
    /// unsupported file aborts the batch up front.
    pub async fn queue_paths(
        &self,
        paths: &[PathBuf],
        progress: UploadProgress,
    ) -> Result<UploadQueue, OpsError> {
        let mut queue = UploadQueue::new().with_progress(progress);
        for path in paths {
            let file = queue.add_path(path).await?;
            debug!(name = %file.name, mime = %file.mime_type, size = file.size_bytes, "queued");
        }
        Ok(queue)
    }

    /// Upload everything in `queue` to `dive_id`.
    pub async fn upload_queue(
        &self,
        queue: &mut UploadQueue,
        dive_id: &str,
    ) -> Result<UploadReport, OpsError> {
        info!(dive_id, files = queue.len(), "starting upload");
        Ok(queue.upload(&self.inner, dive_id).await?)
    }

    /// Queue `paths` and upload them to `dive_id` in one batch.
    pub async fn upload_paths(
        &self,
        dive_id: &str,
        paths: &[PathBuf],
        progress: UploadProgress,
    ) -> Result<UploadReport, OpsError> {
        let mut queue = self.queue_paths(paths, progress).await?;
        self.upload_queue(&mut queue, dive_id).await
    }

    /// Start polling `dive_id` until no media item is still processing.
    pub fn watch_processing(&self, dive_id: &str) -> PollerHandle {
        let config = PollConfig {
            interval: self.poll_interval,
            ..PollConfig::default()
        };
        ProcessingPoller::spawn(Arc::clone(&self.inner), dive_id, config)
    }
}
