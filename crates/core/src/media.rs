//! Media item types.
//!
//! Media items are owned by the backend. The client only ever holds a cached
//! copy, learned through dive fetches, and observes the `processing → ready`
//! transition by re-fetching.

use serde::{Deserialize, Serialize};

use crate::id::{null_as_default, string_or_number};

/// Server-side processing state of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaState {
    /// Transcoding or thumbnailing is still running.
    Processing,
    /// All derived artifacts are available.
    Ready,
    /// A state this client does not know about. Treated as terminal.
    #[serde(other)]
    Other,
}

impl MediaState {
    /// Returns `true` if the backend is still working on the item.
    pub fn is_processing(self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Returns the state name as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for MediaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded photo or video with its processing state and derived artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Backend identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Original filename supplied at upload time.
    pub filename: String,
    /// MIME type of the original upload.
    pub mime_type: String,
    /// Location of the original bytes in storage.
    pub raw_url: String,
    /// Location of the transcoded rendition, once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
    /// Thumbnail URLs, largest first. Empty while the item is processing.
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnails: Vec<String>,
    /// Processing state.
    pub state: MediaState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorite: bool,
    /// Creation timestamp as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl MediaItem {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// URL to display as a preview: the first thumbnail, or the raw upload.
    pub fn preview_url(&self) -> &str {
        self.thumbnails.first().map_or(&self.raw_url, String::as_str)
    }

    /// URL to play or view: the processed rendition for videos, raw otherwise.
    pub fn display_url(&self) -> &str {
        if self.is_video() {
            self.processed_url.as_deref().unwrap_or(&self.raw_url)
        } else {
            &self.raw_url
        }
    }
}

/// Body of `POST /media/save`, registering an object already in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMediaRequest {
    pub filename: String,
    pub raw_url: String,
    pub mime_type: String,
}

/// Response of `POST /media/<id>/toggle_favorite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}
