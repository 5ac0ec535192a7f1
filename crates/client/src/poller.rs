//! Processing-status poller.
//!
//! After an upload the backend transcodes and thumbnails each new media item
//! asynchronously. The client only learns that an item went from
//! `processing` to `ready` by re-fetching the dive, so the poller re-fetches
//! on a fixed interval for as long as the latest snapshot still contains a
//! processing item, then stops on its own.
//!
//! The poller runs as a task owned by a [`PollerHandle`]. Stopping or dropping
//! the handle cancels the outstanding timer (and any fetch in flight), so a
//! torn-down view never keeps polling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use divemedia_core::Dive;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{DiveMediaClient, Error};

/// Default delay between re-fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Anything that can produce a fresh snapshot of a dive.
pub trait DiveSource: Send + Sync + 'static {
    fn fetch_dive(&self, dive_id: &str) -> impl Future<Output = Result<Dive, Error>> + Send;
}

impl DiveSource for DiveMediaClient {
    fn fetch_dive(&self, dive_id: &str) -> impl Future<Output = Result<Dive, Error>> + Send {
        self.get_dive(dive_id)
    }
}

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between a snapshot with processing items and the next fetch.
    pub interval: Duration,
    /// Keep polling after a failed fetch instead of ending the sequence.
    pub retry_on_error: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            retry_on_error: false,
        }
    }
}

/// Whether a poller is still scheduling fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No processing items seen (or the poller ended).
    Idle,
    /// The last snapshot had at least one processing item.
    Polling,
}

/// How a polling sequence ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The last snapshot had no processing items.
    Settled(Dive),
    /// A fetch failed and retries are disabled.
    Failed(Error),
    /// The handle was stopped or dropped.
    Cancelled,
}

impl PollOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// Entry point for starting pollers.
#[derive(Debug)]
pub struct ProcessingPoller;

impl ProcessingPoller {
    /// Start polling `dive_id`. The first fetch happens immediately.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), divemedia_client::Error> {
    /// use std::sync::Arc;
    /// use divemedia_client::{DiveMediaClient, PollConfig, PollOutcome, ProcessingPoller};
    ///
    /// let client = Arc::new(
    ///     DiveMediaClient::builder("http://localhost:8000")
    ///         .access_token("token")
    ///         .build()?,
    /// );
    /// let handle = ProcessingPoller::spawn(client, "42", PollConfig::default());
    /// if let PollOutcome::Settled(dive) = handle.join().await {
    ///     println!("{} items ready", dive.media_items.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<S: DiveSource>(
        source: Arc<S>,
        dive_id: impl Into<String>,
        config: PollConfig,
    ) -> PollerHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(run(source, dive_id.into(), config, cancel.clone(), tx));
        PollerHandle {
            cancel,
            task: Some(task),
            snapshots: rx,
        }
    }
}

/// Owns a running poller. Dropping the handle stops it.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<PollOutcome>>,
    snapshots: watch::Receiver<Option<Dive>>,
}

impl PollerHandle {
    /// Receiver for every snapshot the poller fetches.
    pub fn snapshots(&self) -> watch::Receiver<Option<Dive>> {
        self.snapshots.clone()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<Dive> {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> PollState {
        match &self.task {
            Some(task) if !task.is_finished() => PollState::Polling,
            _ => PollState::Idle,
        }
    }

    /// Cancel the outstanding timer. No further fetch is issued.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the sequence to end.
    pub async fn join(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => PollOutcome::Cancelled,
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[instrument(skip(source, config, cancel, snapshots))]
async fn run<S: DiveSource>(
    source: Arc<S>,
    dive_id: String,
    config: PollConfig,
    cancel: CancellationToken,
    snapshots: watch::Sender<Option<Dive>>,
) -> PollOutcome {
    let mut fetches: u64 = 0;
    loop {
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return PollOutcome::Cancelled,
            result = source.fetch_dive(&dive_id) => result,
        };
        fetches += 1;

        match fetched {
            Ok(dive) => {
                let processing = dive.processing_count();
                snapshots.send_replace(Some(dive.clone()));
                if processing == 0 {
                    info!(fetches, "media processing settled");
                    return PollOutcome::Settled(dive);
                }
                debug!(processing, fetches, "media still processing");
            }
            Err(e) => {
                warn!(error = %e, fetches, "failed to fetch dive while polling");
                if !config.retry_on_error {
                    return PollOutcome::Failed(e);
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return PollOutcome::Cancelled,
            () = tokio::time::sleep(config.interval) => {}
        }
    }
}
