//! Core domain types shared by the divemedia client, ops layer and CLI.

pub mod dive;
pub mod dive_log;
pub mod id;
pub mod media;
pub mod session;
pub mod upload;

pub use dive::{Dive, NewDive, RenameDive};
pub use dive_log::DiveLog;
pub use media::{FavoriteResponse, MediaItem, MediaState, SaveMediaRequest};
pub use session::{Session, SessionUser};
pub use upload::{
    PendingFile, UploadStage, UploadState, UploadUrlRequest, UploadUrlsRequest, format_size,
    guess_mime, is_supported_media,
};
