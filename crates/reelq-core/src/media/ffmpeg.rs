//! ffprobe / ffmpeg implementations of the media collaborators.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{DurationProbe, MediaError, TranscodeRequest, Transcoder};
use crate::config::TranscodeConfig;

/// Keep at most this much of ffmpeg's stderr in errors.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format` output into seconds.
fn parse_probe_output(stdout: &[u8]) -> Result<f64, MediaError> {
    let out: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::Probe(format!("unreadable ffprobe output: {}", e)))?;
    out.format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| MediaError::Probe("no duration in ffprobe output".to_string()))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let s = String::from_utf8_lossy(stderr);
    let s = s.trim();
    let mut start = s.len().saturating_sub(STDERR_TAIL);
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[derive(Debug, Clone)]
pub struct Ffprobe {
    bin: String,
}

impl Ffprobe {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl DurationProbe for Ffprobe {
    async fn duration_secs(&self, file: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.bin)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::Probe(format!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        parse_probe_output(&output.stdout)
    }
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    cfg: TranscodeConfig,
}

impl Ffmpeg {
    pub fn new(cfg: TranscodeConfig) -> Self {
        Self { cfg }
    }

    /// Arguments for cutting and re-encoding one segment.
    pub fn segment_args(&self, req: &TranscodeRequest<'_>) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            req.input.to_string_lossy().into_owned(),
            "-ss".to_string(),
            format!("{:.3}", req.start_secs),
            "-t".to_string(),
            format!("{:.3}", req.duration_secs),
            "-c:v".to_string(),
            self.cfg.video_codec.clone(),
            "-b:v".to_string(),
            req.video_bitrate.to_string(),
            "-c:a".to_string(),
            self.cfg.audio_codec.clone(),
            "-b:a".to_string(),
            self.cfg.audio_bitrate.clone(),
            "-max_muxing_queue_size".to_string(),
            "1024".to_string(),
            "-y".to_string(),
            req.output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, req: &TranscodeRequest<'_>) -> Result<PathBuf, MediaError> {
        tracing::debug!(
            input = %req.input.display(),
            start = req.start_secs,
            duration = req.duration_secs,
            bitrate = req.video_bitrate,
            "ffmpeg segment"
        );
        let output = Command::new(&self.cfg.ffmpeg)
            .args(self.segment_args(req))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::Transcode {
                message: format!("{} exited with {}", self.cfg.ffmpeg, output.status),
                stderr: Some(stderr_tail(&output.stderr)),
            });
        }
        Ok(req.output.to_path_buf())
    }
}
