//! divemedia HTTP Client
//!
//! A native Rust client for the divemedia backend: dives, media items, dive
//! logs, direct-to-storage uploads and processing-status polling.
//!
//! # Quick Start
//!
//! ```no_run
//! use divemedia_client::{DiveMediaClient, UploadQueue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), divemedia_client::Error> {
//!     let client = DiveMediaClient::builder("http://localhost:8000")
//!         .access_token("eyJhbGciOi...")
//!         .build()?;
//!
//!     for dive in client.list_dives().await? {
//!         println!("{}: {} items", dive.name, dive.media_items.len());
//!     }
//!
//!     let mut queue = UploadQueue::new();
//!     queue.add_path("reef.jpg").await?;
//!     queue.upload(&client, "42").await?.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - Authenticated fetch wrapper with a distinguished not-found error
//! - Reference-counted busy indicator shared by all calls
//! - Parallel uploads with per-file progress and per-file retry
//! - Cancellable processing-status poller
//!
//! # Configuration
//!
//! ```no_run
//! use divemedia_client::DiveMediaClientBuilder;
//! use std::time::Duration;
//!
//! let client = DiveMediaClientBuilder::new("http://localhost:8000")
//!     .timeout(Duration::from_secs(30))
//!     .upload_timeout(Duration::from_secs(600))
//!     .access_token("token")
//!     .build()
//!     .unwrap();
//! ```

mod busy;
mod dives;
mod error;
mod media;
pub mod poller;
pub mod session;
pub mod upload;

pub use busy::{BusyGuard, BusyIndicator};
pub use dives::DeleteDiveOptions;
pub use error::Error;
pub use media::BatchItemResult;
pub use poller::{DiveSource, PollConfig, PollOutcome, PollState, PollerHandle, ProcessingPoller};
pub use session::{SessionProvider, SessionStore, StaticSession};
pub use upload::{ProgressUpdate, UploadProgress, UploadQueue, UploadReport};

// Re-export core types so callers don't need a direct `divemedia_core` dependency.
pub use divemedia_core::{
    Dive, DiveLog, MediaItem, MediaState, NewDive, PendingFile, Session, UploadStage, UploadState,
};

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Default request timeout for backend calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters left unescaped in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Percent-encode one path segment.
pub(crate) fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// HTTP client for the divemedia backend.
///
/// Cheap to clone; clones share the connection pool, session provider and
/// busy indicator.
#[derive(Debug, Clone)]
pub struct DiveMediaClient {
    client: Client,
    upload_client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    busy: BusyIndicator,
}

/// Builder for configuring a [`DiveMediaClient`].
#[derive(Debug)]
pub struct DiveMediaClientBuilder {
    base_url: String,
    timeout: Duration,
    upload_timeout: Option<Duration>,
    session: Option<Arc<dyn SessionProvider>>,
    busy: Option<BusyIndicator>,
    client: Option<Client>,
}

impl DiveMediaClientBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            upload_timeout: None,
            session: None,
            busy: None,
            client: None,
        }
    }

    /// Set the timeout for backend calls.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout for direct-to-storage PUTs. Unbounded by default.
    #[must_use]
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    /// Authenticate every call with a fixed bearer token.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.session = Some(Arc::new(StaticSession::from_token(token)));
        self
    }

    /// Resolve the bearer token from a session provider before each call.
    #[must_use]
    pub fn session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(provider);
        self
    }

    /// Share a busy indicator with other clients or with the UI.
    #[must_use]
    pub fn busy_indicator(mut self, busy: BusyIndicator) -> Self {
        self.busy = Some(busy);
        self
    }

    /// Use a custom reqwest Client for all calls, including uploads.
    ///
    /// Useful for configuring TLS, proxies, or other advanced settings.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<DiveMediaClient, Error> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Configuration(format!("invalid base URL {}: {e}", self.base_url)))?;

        let (client, upload_client) = match self.client {
            Some(c) => (c.clone(), c),
            None => {
                let client = Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| Error::Configuration(e.to_string()))?;
                let mut upload = Client::builder();
                if let Some(timeout) = self.upload_timeout {
                    upload = upload.timeout(timeout);
                }
                let upload_client = upload
                    .build()
                    .map_err(|e| Error::Configuration(e.to_string()))?;
                (client, upload_client)
            }
        };

        Ok(DiveMediaClient {
            client,
            upload_client,
            base_url: self.base_url,
            session: self
                .session
                .unwrap_or_else(|| Arc::new(StaticSession::none())),
            busy: self.busy.unwrap_or_default(),
        })
    }
}

/// Options for a raw backend call made through [`DiveMediaClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a header. Headers set here override the defaults.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send `body` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        self.body =
            Some(serde_json::to_value(body).map_err(|e| Error::Serialization(e.to_string()))?);
        Ok(self)
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl DiveMediaClient {
    /// Create a new client with default configuration and no session.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use divemedia_client::DiveMediaClient;
    ///
    /// let client = DiveMediaClient::new("http://localhost:8000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        DiveMediaClientBuilder::new(base_url)
            .build()
            .expect("default client configuration should not fail")
    }

    /// Create a builder for advanced configuration.
    pub fn builder(base_url: impl Into<String>) -> DiveMediaClientBuilder {
        DiveMediaClientBuilder::new(base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The busy indicator toggled by every backend call.
    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    /// The current session, if the provider has one.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.session().await
    }

    /// Resolve the session or fail with [`Error::NoSession`].
    pub async fn require_session(&self) -> Result<Session, Error> {
        self.session.session().await.ok_or(Error::NoSession)
    }

    // =========================================================================
    // Authenticated fetch
    // =========================================================================

    /// Call a backend endpoint and decode the JSON response.
    ///
    /// Fails with [`Error::NoSession`] before touching the network when no
    /// session is available, with [`Error::NotFound`] on 404 and with
    /// [`Error::RequestFailed`] on any other non-2xx status.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), divemedia_client::Error> {
    /// use divemedia_client::{DiveMediaClient, RequestOptions};
    ///
    /// let client = DiveMediaClient::builder("http://localhost:8000")
    ///     .access_token("token")
    ///     .build()?;
    /// let dives: serde_json::Value = client.request("/dives/", RequestOptions::get()).await?;
    /// println!("{dives}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, Error> {
        let body = self.fetch(path, options).await?;
        serde_json::from_slice(&body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Call a backend endpoint and discard the response body.
    pub async fn request_empty(&self, path: &str, options: RequestOptions) -> Result<(), Error> {
        self.fetch(path, options).await.map(drop)
    }

    async fn fetch(&self, path: &str, options: RequestOptions) -> Result<bytes::Bytes, Error> {
        let session = self.require_session().await?;
        let _busy = self.busy.enter();

        let url = format!("{}{}", self.base_url, path);
        debug!(method = %options.method, %url, "backend request");

        let mut req = self
            .client
            .request(options.method, &url)
            .bearer_auth(&session.access_token)
            .header(CONTENT_TYPE, "application/json");
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(body) = &options.body {
            let raw =
                serde_json::to_vec(body).map_err(|e| Error::Serialization(e.to_string()))?;
            req = req.body(raw);
        }
        if !options.headers.is_empty() {
            req = req.headers(options.headers);
        }

        let response = check_status(req.send().await?).await?;
        Ok(response.bytes().await?)
    }
}

/// Map a response status onto the error taxonomy.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        debug!(url = %response.url(), "backend returned 404");
        return Err(Error::NotFound);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::RequestFailed {
        status: status.as_u16(),
        message,
    })
}
