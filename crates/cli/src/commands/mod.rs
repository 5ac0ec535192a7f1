pub mod auth;
pub mod dives;
pub mod log;
pub mod media;
pub mod upload;
pub mod watch;
