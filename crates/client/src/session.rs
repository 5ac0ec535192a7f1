//! Session providers.
//!
//! The client never reaches for a global auth singleton. It is handed a
//! [`SessionProvider`] at construction and asks it for the current session
//! before every backend call.
//!
//! [`SessionStore`] talks to a GoTrue-compatible auth service (password grant,
//! refresh grant, logout, OAuth authorize URL) and publishes every session
//! change on a `watch` channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use divemedia_core::{Session, SessionUser};
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use crate::Error;

/// Sessions expiring within this window are refreshed ahead of time.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Source of the current authenticated session.
#[async_trait]
pub trait SessionProvider: Send + Sync + std::fmt::Debug {
    /// The session to use for the next call, or `None` if signed out.
    async fn session(&self) -> Option<Session>;
}

/// A fixed session, typically built from a pre-issued access token.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    session: Option<Session>,
}

impl StaticSession {
    pub fn new(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self::new(Session::from_token(access_token))
    }

    /// A provider that never yields a session.
    pub fn none() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn session(&self) -> Option<Session> {
        self.session.clone()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .or_else(|| self.expires_in.map(|secs| now + secs)),
            user: self.user.map(|u| SessionUser {
                id: u.id,
                email: u.email,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self, status: reqwest::StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| format!("auth service returned {status}"))
    }
}

/// Session holder backed by a GoTrue-compatible auth service.
///
/// Clones share the same session state. Concurrent callers that find the
/// session near expiry share a single refresh grant.
#[derive(Debug, Clone)]
pub struct SessionStore {
    auth_url: Option<String>,
    api_key: Option<String>,
    client: Client,
    current: Arc<watch::Sender<Option<Session>>>,
    refresh_lock: Arc<Mutex<()>>,
    persist_path: Option<PathBuf>,
}

impl SessionStore {
    /// Create a store for the auth service at `auth_url`, authenticating the
    /// client application with the service's public `api_key`.
    pub fn new(auth_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut store = Self::offline();
        store.auth_url = Some(auth_url.into().trim_end_matches('/').to_string());
        store.api_key = Some(api_key.into());
        store
    }

    /// A store that cannot sign in; sessions are only set explicitly or loaded
    /// from disk.
    pub fn offline() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            auth_url: None,
            api_key: None,
            client: Client::new(),
            current: Arc::new(tx),
            refresh_lock: Arc::new(Mutex::new(())),
            persist_path: None,
        }
    }

    /// Use a custom reqwest client for auth calls.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Persist every session change as JSON at `path`. On unix the file is
    /// kept at mode `0600`.
    #[must_use]
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    /// Load a previously persisted session, if the file exists.
    pub async fn load(&self) -> Result<Option<Session>, Error> {
        let Some(path) = &self.persist_path else {
            return Ok(None);
        };
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_slice(&raw)
            .map_err(|e| Error::Deserialization(format!("session file: {e}")))?;
        debug!(path = %path.display(), "loaded persisted session");
        self.current.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    /// The current session without refreshing it.
    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    /// Replace the current session and persist it.
    pub async fn set_session(&self, session: Option<Session>) -> Result<(), Error> {
        self.current.send_replace(session.clone());
        self.persist(session.as_ref()).await
    }

    /// Subscribe to auth-state changes. The receiver sees every sign-in,
    /// refresh and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    fn endpoint(&self, path: &str) -> Result<String, Error> {
        let base = self
            .auth_url
            .as_deref()
            .ok_or_else(|| Error::Configuration("auth service URL is not configured".into()))?;
        Ok(format!("{base}{path}"))
    }

    fn with_api_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, Error> {
        let url = self.endpoint("/auth/v1/token")?;
        let response = self
            .with_api_key(self.client.post(&url))
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<AuthErrorBody>().await.unwrap_or_default();
            return Err(Error::Auth(body.into_message(status)));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    /// Sign in with email and password.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        let session = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        info!(user = ?session.user.as_ref().map(|u| &u.id), "signed in");
        self.set_session(Some(session.clone())).await?;
        Ok(session)
    }

    /// Exchange the refresh token for a new session.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Session, Error> {
        let refresh_token = self
            .current()
            .and_then(|s| s.refresh_token)
            .ok_or(Error::NoSession)?;
        let session = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        debug!("session refreshed");
        self.set_session(Some(session.clone())).await?;
        Ok(session)
    }

    /// URL to open in a browser to sign in with an OAuth `provider`; the auth
    /// service redirects back to `redirect_to` afterwards.
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, Error> {
        let base = self.endpoint("/auth/v1/authorize")?;
        let url = reqwest::Url::parse_with_params(
            &base,
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(url.into())
    }

    /// Sign out. The local session is cleared even if the auth service
    /// rejects the call; that failure is still returned.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), Error> {
        let Some(session) = self.current() else {
            return Ok(());
        };

        let remote = match self.endpoint("/auth/v1/logout") {
            Ok(url) => self.logout_remote(&url, &session).await,
            // Nothing to revoke against; local sign-out is all there is.
            Err(_) => Ok(()),
        };

        self.set_session(None).await?;
        info!("signed out");
        remote
    }

    async fn logout_remote(&self, url: &str, session: &Session) -> Result<(), Error> {
        let response = self
            .with_api_key(self.client.post(url))
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(%status, "auth service rejected logout");
            let body = response.json::<AuthErrorBody>().await.unwrap_or_default();
            Err(Error::Auth(body.into_message(status)))
        }
    }

    async fn persist(&self, session: Option<&Session>) -> Result<(), Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        match session {
            Some(session) => {
                let raw = serde_json::to_vec_pretty(session)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                write_private(path, &raw).await?;
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

/// Write `raw` to `path`, readable and writable by the owner only.
async fn write_private(path: &Path, raw: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    // `mode` only applies on creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(raw).await?;
    file.flush().await
}

#[async_trait]
impl SessionProvider for SessionStore {
    async fn session(&self) -> Option<Session> {
        let session = self.current()?;
        let now = chrono::Utc::now().timestamp();
        if !session.is_expired_at(now + REFRESH_MARGIN_SECS) {
            return Some(session);
        }
        if session.refresh_token.is_none() || self.auth_url.is_none() {
            return (!session.is_expired_at(now)).then_some(session);
        }

        let _refreshing = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let session = self.current()?;
        let now = chrono::Utc::now().timestamp();
        if !session.is_expired_at(now + REFRESH_MARGIN_SECS) {
            return Some(session);
        }
        match self.refresh().await {
            Ok(fresh) => Some(fresh),
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                (!session.is_expired_at(now)).then_some(session)
            }
        }
    }
}
