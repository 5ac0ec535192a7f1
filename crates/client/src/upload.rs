//! Direct-to-storage uploads.
//!
//! An upload batch runs in two phases:
//!
//! 1. One call to `POST /media/get_upload_urls` returns a pre-signed storage
//!    URL for every queued file, keyed by the file's client-generated id.
//! 2. Every file then runs its own chain concurrently: PUT the bytes to its
//!    URL while publishing progress, and as soon as that PUT succeeds register
//!    the object with `POST /media/save`. Chains are independent; a failure in
//!    one does not cancel the others, and registered files are never rolled
//!    back.
//!
//! [`UploadQueue`] owns the queued files, their per-file [`UploadState`] and
//! the shared [`UploadProgress`] map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use divemedia_core::{
    PendingFile, SaveMediaRequest, UploadStage, UploadState, UploadUrlRequest, UploadUrlsRequest,
    guess_mime, is_supported_media,
};
use futures::future::join_all;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

use crate::{DiveMediaClient, Error, RequestOptions, check_status};

/// Percentage of `total` covered by `loaded`, rounded half up and clamped to
/// `0..=100`. An empty file is complete by definition.
pub fn percent_complete(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let loaded = u128::from(loaded.min(total));
    let total = u128::from(total);
    let pct = (loaded * 200 + total) / (total * 2);
    u8::try_from(pct).unwrap_or(100)
}

/// A progress change for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub file_id: String,
    pub percent: u8,
}

/// Per-file upload progress, keyed by [`PendingFile::id`].
///
/// Values only move forward: publishing a lower percentage than the one
/// already recorded is ignored. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    percent: Arc<DashMap<String, u8>>,
    listener: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every accepted progress change to `tx`.
    #[must_use]
    pub fn with_listener(mut self, tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        self.listener = Some(tx);
        self
    }

    /// Record `percent` for `file_id`. Returns `true` if the value advanced.
    pub fn publish(&self, file_id: &str, percent: u8) -> bool {
        let percent = percent.min(100);
        let advanced = match self.percent.entry(file_id.to_owned()) {
            Entry::Occupied(mut e) => {
                if percent > *e.get() {
                    e.insert(percent);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(percent);
                true
            }
        };
        if advanced {
            if let Some(tx) = &self.listener {
                // A dropped listener just stops receiving updates.
                let _ = tx.send(ProgressUpdate {
                    file_id: file_id.to_owned(),
                    percent,
                });
            }
        }
        advanced
    }

    pub fn get(&self, file_id: &str) -> Option<u8> {
        self.percent.get(file_id).map(|v| *v)
    }

    pub fn remove(&self, file_id: &str) {
        self.percent.remove(file_id);
    }

    pub fn clear(&self) {
        self.percent.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.percent.is_empty()
    }

    /// Copy of the current map.
    pub fn snapshot(&self) -> HashMap<String, u8> {
        self.percent
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}

/// A queued file and where it is in its upload chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFile {
    pub file: PendingFile,
    pub state: UploadState,
}

/// Final state of one file after a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file_id: String,
    pub name: String,
    pub state: UploadState,
}

/// Result of one [`UploadQueue::upload`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub outcomes: Vec<FileOutcome>,
}

impl UploadReport {
    pub fn registered(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.state.is_registered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.state.is_registered())
    }

    /// `true` when every file of the batch was registered.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.state.is_registered())
    }

    /// Turn a partially failed batch into [`Error::UploadIncomplete`].
    pub fn into_result(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::UploadIncomplete {
                registered: self.registered().count(),
                failed: self.failed().count(),
            })
        }
    }
}

/// Where a file's chain starts in this batch.
enum ChainStart {
    Put(String),
    Register(String),
    MissingUrl,
}

/// Files waiting to be uploaded to a dive.
#[derive(Debug, Clone, Default)]
pub struct UploadQueue {
    entries: Vec<QueuedFile>,
    progress: UploadProgress,
    max_concurrent: Option<usize>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish progress into `progress` instead of a private map.
    #[must_use]
    pub fn with_progress(mut self, progress: UploadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Run at most `limit` file chains at a time. Unbounded by default.
    #[must_use]
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = Some(limit.max(1));
        self
    }

    /// Queue a file.
    pub fn add(&mut self, file: PendingFile) -> &PendingFile {
        self.entries.push(QueuedFile {
            file,
            state: UploadState::Pending,
        });
        &self.entries[self.entries.len() - 1].file
    }

    /// Queue a photo or video from disk. The MIME type is guessed from the
    /// extension; anything that is not `image/*` or `video/*` is rejected.
    pub async fn add_path(&mut self, path: impl AsRef<Path>) -> Result<&PendingFile, Error> {
        let file = pending_file_from_path(path.as_ref()).await?;
        Ok(self.add(file))
    }

    /// Drop a file from the queue together with its progress entry.
    pub fn remove(&mut self, file_id: &str) -> Option<PendingFile> {
        let idx = self.entries.iter().position(|e| e.file.id == file_id)?;
        self.progress.remove(file_id);
        Some(self.entries.remove(idx).file)
    }

    pub fn entries(&self) -> &[QueuedFile] {
        &self.entries
    }

    pub fn files(&self) -> impl Iterator<Item = &PendingFile> {
        self.entries.iter().map(|e| &e.file)
    }

    pub fn state(&self, file_id: &str) -> Option<&UploadState> {
        self.entries
            .iter()
            .find(|e| e.file.id == file_id)
            .map(|e| &e.state)
    }

    pub fn progress(&self) -> &UploadProgress {
        &self.progress
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upload every queued file to `dive_id`.
    ///
    /// Files whose bytes already reached storage in an earlier attempt are only
    /// registered again. On full success the queue and the progress map are
    /// cleared. Otherwise registered files leave the queue and failed ones stay
    /// with their [`UploadState`] so they can be retried.
    ///
    /// A broker failure aborts the batch before any PUT and is returned as the
    /// error; per-file failures are reported in the [`UploadReport`].
    #[instrument(skip(self, client), fields(files = self.entries.len()))]
    pub async fn upload(
        &mut self,
        client: &DiveMediaClient,
        dive_id: &str,
    ) -> Result<UploadReport, Error> {
        if self.entries.is_empty() {
            return Ok(UploadReport::default());
        }

        let requests: Vec<UploadUrlRequest> = self
            .entries
            .iter()
            .filter(|e| e.state.needs_put())
            .map(|e| e.file.url_request())
            .collect();
        let mut urls = if requests.is_empty() {
            HashMap::new()
        } else {
            client.request_upload_urls(&requests).await?
        };

        let plans: Vec<(PendingFile, ChainStart)> = self
            .entries
            .iter()
            .map(|e| {
                let start = match e.state.stored_url() {
                    Some(raw_url) => ChainStart::Register(raw_url.to_owned()),
                    None => urls
                        .remove(&e.file.id)
                        .map_or(ChainStart::MissingUrl, ChainStart::Put),
                };
                (e.file.clone(), start)
            })
            .collect();

        let progress = self.progress.clone();
        let chains = plans
            .into_iter()
            .map(|(file, start)| run_chain(client, dive_id, file, start, &progress));
        let outcomes: Vec<FileOutcome> = match self.max_concurrent {
            Some(limit) => futures::stream::iter(chains)
                .buffer_unordered(limit)
                .collect()
                .await,
            None => join_all(chains).await,
        };

        for outcome in &outcomes {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.file.id == outcome.file_id)
            {
                entry.state = outcome.state.clone();
            }
        }

        let report = UploadReport { outcomes };
        if report.is_success() {
            info!(registered = report.outcomes.len(), "upload batch complete");
            self.entries.clear();
            self.progress.clear();
        } else {
            let failed = report.failed().count();
            warn!(
                registered = report.registered().count(),
                failed, "upload batch finished with failures"
            );
            for entry in self.entries.iter().filter(|e| e.state.is_registered()) {
                self.progress.remove(&entry.file.id);
            }
            self.entries.retain(|e| !e.state.is_registered());
        }
        Ok(report)
    }
}

/// Build a [`PendingFile`] from a file on disk.
pub async fn pending_file_from_path(path: &Path) -> Result<PendingFile, Error> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    let mime = guess_mime(path).unwrap_or_else(|| "application/octet-stream".to_string());
    if !is_supported_media(&mime) {
        return Err(Error::UnsupportedMedia {
            path: PathBuf::from(path),
            mime,
        });
    }
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(PendingFile::new(path, name, mime, meta.len()))
}

async fn run_chain(
    client: &DiveMediaClient,
    dive_id: &str,
    file: PendingFile,
    start: ChainStart,
    progress: &UploadProgress,
) -> FileOutcome {
    let state = match start {
        ChainStart::MissingUrl => {
            warn!(file_id = %file.id, name = %file.name, "no upload URL returned for file");
            UploadState::Failed {
                stage: UploadStage::Broker,
                message: "no upload URL returned for this file".into(),
                raw_url: None,
            }
        }
        ChainStart::Register(raw_url) => register(client, dive_id, &file, raw_url).await,
        ChainStart::Put(url) => match client.put_file(&file, &url, progress).await {
            Ok(()) => register(client, dive_id, &file, url).await,
            Err(e) => {
                warn!(file_id = %file.id, name = %file.name, error = %e, "upload failed");
                UploadState::Failed {
                    stage: UploadStage::Put,
                    message: e.to_string(),
                    raw_url: None,
                }
            }
        },
    };
    FileOutcome {
        file_id: file.id,
        name: file.name,
        state,
    }
}

async fn register(
    client: &DiveMediaClient,
    dive_id: &str,
    file: &PendingFile,
    raw_url: String,
) -> UploadState {
    let request = SaveMediaRequest {
        filename: file.name.clone(),
        raw_url: raw_url.clone(),
        mime_type: file.mime_type.clone(),
    };
    match client.save_media(dive_id, &request).await {
        Ok(()) => {
            debug!(file_id = %file.id, "media registered");
            UploadState::Registered { raw_url }
        }
        Err(e) => {
            warn!(
                file_id = %file.id,
                name = %file.name,
                error = %e,
                "object stored but registration failed"
            );
            UploadState::Failed {
                stage: UploadStage::Register,
                message: e.to_string(),
                raw_url: Some(raw_url),
            }
        }
    }
}

impl DiveMediaClient {
    /// Ask the backend for one pre-signed destination per file.
    ///
    /// Single attempt; failures surface as backend-call errors.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn request_upload_urls(
        &self,
        files: &[UploadUrlRequest],
    ) -> Result<HashMap<String, String>, Error> {
        let body = UploadUrlsRequest {
            files: files.to_vec(),
        };
        self.request("/media/get_upload_urls", RequestOptions::post().json(&body)?)
            .await
    }

    /// PUT a file's bytes to a pre-signed URL, streaming from disk and
    /// publishing progress after every chunk.
    ///
    /// The URL is opaque and already authorizes the upload, so no bearer token
    /// is attached.
    #[instrument(skip(self, file, url, progress), fields(file_id = %file.id, name = %file.name))]
    pub async fn put_file(
        &self,
        file: &PendingFile,
        url: &str,
        progress: &UploadProgress,
    ) -> Result<(), Error> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let total = file.size_bytes;
        progress.publish(&file.id, 0);

        let sink = progress.clone();
        let file_id = file.id.clone();
        let mut loaded: u64 = 0;
        let body = ReaderStream::new(handle).map_ok(move |chunk| {
            loaded += chunk.len() as u64;
            sink.publish(&file_id, percent_complete(loaded, total));
            chunk
        });

        debug!(bytes = total, "uploading to storage");
        let response = self
            .upload_client
            .put(url)
            .header(CONTENT_TYPE, &file.mime_type)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        check_status(response).await?;

        progress.publish(&file.id, 100);
        Ok(())
    }
}
