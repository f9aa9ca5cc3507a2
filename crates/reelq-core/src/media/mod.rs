//! Media post-processing: duration probing, transcoding and size-based chunking.
//!
//! `DurationProbe` and `Transcoder` are the seams to the external media
//! engine; `ffmpeg` implements them with ffprobe/ffmpeg. `chunker` holds the
//! split plan and the bounded retry/degrade loop.

pub mod chunker;
pub mod ffmpeg;

pub use chunker::{ChunkLimits, ChunkPlan, Chunker};

use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("transcode failed: {message}")]
    Transcode {
        message: String,
        stderr: Option<String>,
    },
}

/// One segment to cut out of `input` and re-encode into `output`.
#[derive(Debug, Clone)]
pub struct TranscodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Target video bitrate in ffmpeg notation, e.g. `1500k`.
    pub video_bitrate: &'a str,
}

/// Reports the playback duration of a media file.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_secs(&self, file: &Path) -> Result<f64, MediaError>;
}

/// Cuts and re-encodes one segment of a media file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the path of the produced file (normally `req.output`).
    async fn transcode(&self, req: &TranscodeRequest<'_>) -> Result<PathBuf, MediaError>;
}
