//! Content fetching: resolve a content reference into local media files.
//!
//! The scheduler only sees the `ContentFetcher` trait. Platform-specific
//! fetchers (sessions, logins, scraping) live behind it and own whatever
//! per-user state they need. `HttpFetcher` handles direct media links.

mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::url_model::ContentRef;

/// Kind of a fetched media file; decides how the delivery channel sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Classify by file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" => Some(MediaKind::Image),
            "mp4" | "mov" | "m4v" | "webm" | "mkv" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Classify by `Content-Type` header value (parameters are ignored).
    pub fn from_content_type(value: &str) -> Option<Self> {
        let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// One fetched file, owned by the job's working directory.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Everything a fetch produced for one content reference.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Media files in delivery order.
    pub items: Vec<MediaItem>,
    /// Account that published the content, if the source exposes it.
    pub owner: Option<String>,
    /// Human-readable origin (platform or host) for captions.
    pub source: String,
}

/// Fetch failures surfaced directly to the user; the scheduler never retries them.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("content not found: {0}")]
    NotFound(String),
    #[error("content is private or restricted: {0}")]
    PrivateOrRestricted(String),
    #[error("network error: {0}")]
    Transient(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
}

/// Resolves a content reference into downloaded media files.
///
/// Called at most once per job. Files must be written under `work_dir`, which
/// the executor owns and removes when the job ends.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(
        &self,
        reference: &ContentRef,
        work_dir: &Path,
    ) -> Result<FetchedContent, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(MediaKind::from_extension("JPG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("mov"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("json"), None);
    }

    #[test]
    fn media_kind_from_content_type() {
        assert_eq!(
            MediaKind::from_content_type("video/mp4; codecs=avc1"),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_content_type("Image/JPEG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_content_type("text/html"), None);
    }
}
