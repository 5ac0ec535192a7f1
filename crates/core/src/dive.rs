//! Dive aggregate.

use serde::{Deserialize, Serialize};

use crate::id::{null_as_default, string_or_number};
use crate::media::{MediaItem, MediaState};

/// A user-defined collection of media items representing one diving session.
///
/// The client's copy may be stale between fetches: a just-registered upload
/// shows up as `processing` until a later fetch reports it `ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dive {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Dive date as reported by the backend (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_items: Vec<MediaItem>,
}

impl Dive {
    /// Items still being processed server-side.
    pub fn processing_items(&self) -> impl Iterator<Item = &MediaItem> {
        self.media_items.iter().filter(|m| m.state.is_processing())
    }

    /// Items whose derived artifacts are available.
    pub fn ready_items(&self) -> impl Iterator<Item = &MediaItem> {
        self.media_items
            .iter()
            .filter(|m| m.state == MediaState::Ready)
    }

    pub fn processing_count(&self) -> usize {
        self.processing_items().count()
    }

    /// Returns `true` while at least one item is still processing.
    pub fn has_processing(&self) -> bool {
        self.media_items.iter().any(|m| m.state.is_processing())
    }

    /// Look up a media item by id.
    pub fn media(&self, id: &str) -> Option<&MediaItem> {
        self.media_items.iter().find(|m| m.id == id)
    }
}

/// Body of `POST /dives/save`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDive {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl NewDive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            date: None,
        }
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Body of `PATCH /dives/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDive {
    pub name: String,
}
