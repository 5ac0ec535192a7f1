//! Client-side upload types.
//!
//! A [`PendingFile`] is a local file queued for upload. Each queued file walks
//! through an explicit chain: it is PUT to a pre-signed storage URL and then
//! registered with the backend. [`UploadState`] records where each file got to
//! so that a partially failed batch can be inspected and retried per file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Client-generated identifier, random and collision tolerant.
    pub id: String,
    /// File name sent to the backend.
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Local path the bytes are read from.
    pub path: PathBuf,
}

impl PendingFile {
    /// Create a pending file with a fresh random id.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            path: path.into(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    /// Entry sent to the upload-URL broker for this file.
    pub fn url_request(&self) -> UploadUrlRequest {
        UploadUrlRequest {
            id: self.id.clone(),
            name: self.name.clone(),
            content_type: self.mime_type.clone(),
            size: self.size_bytes,
        }
    }
}

/// Guess the MIME type of a file from its extension.
pub fn guess_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// Only photos and videos are accepted for upload.
pub fn is_supported_media(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type.starts_with("video/")
}

/// Human-readable byte size, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    if unit == 0 {
        return format!("{bytes} Bytes");
    }
    // Two decimals, trailing zeros trimmed.
    let divisor = 1024u64.pow(u32::try_from(unit).unwrap_or(4));
    let hundredths = (u128::from(bytes) * 100 + u128::from(divisor) / 2) / u128::from(divisor);
    let whole = hundredths / 100;
    let frac = hundredths % 100;
    let rendered = if frac == 0 {
        format!("{whole}")
    } else if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    };
    format!("{rendered} {}", UNITS[unit])
}

/// One entry of the upload-URL broker request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

/// Body of `POST /media/get_upload_urls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlsRequest {
    pub files: Vec<UploadUrlRequest>,
}

/// Step of the per-file upload chain at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    /// The broker returned no destination for the file.
    Broker,
    /// Transferring the bytes to storage.
    Put,
    /// Registering the stored object with the backend.
    Register,
}

impl std::fmt::Display for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Broker => "broker",
            Self::Put => "put",
            Self::Register => "register",
        })
    }
}

/// Where a queued file is in its broker, put, register chain.
///
/// A put that succeeds is followed by registration in the same task, so a
/// file is never left resting between the two. A register failure records
/// the stored URL in `Failed` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Pending,
    Registered { raw_url: String },
    Failed {
        stage: UploadStage,
        message: String,
        /// Set when the bytes already reached storage, so a retry only has
        /// to register them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_url: Option<String>,
    },
}

impl UploadState {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Storage URL of bytes already uploaded, if any.
    pub fn stored_url(&self) -> Option<&str> {
        match self {
            Self::Registered { raw_url } => Some(raw_url),
            Self::Failed { raw_url, .. } => raw_url.as_deref(),
            Self::Pending => None,
        }
    }

    /// Returns `true` if the next attempt must transfer the bytes again.
    pub fn needs_put(&self) -> bool {
        !self.is_registered() && self.stored_url().is_none()
    }
}
