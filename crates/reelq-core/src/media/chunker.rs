//! Split oversized media into parts that fit the delivery limit.
//!
//! The file is cut into `ceil(size / working_threshold)` equal-duration
//! segments. A segment that still comes out over the hard limit is encoded
//! once more at the reduced bitrate; if it is still too large (or never
//! materialized) it is dropped. The result is best-effort: the parts that fit,
//! in order, or nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{DurationProbe, TranscodeRequest, Transcoder};
use crate::config::ReelqConfig;
use crate::control::CancelToken;

/// Size limits and bitrates the chunker works with.
#[derive(Debug, Clone)]
pub struct ChunkLimits {
    /// No delivered part may exceed this.
    pub hard_limit: u64,
    /// Parts are planned against this; strictly below `hard_limit`.
    pub working_threshold: u64,
    pub default_bitrate: String,
    pub reduced_bitrate: String,
}

impl ChunkLimits {
    pub fn from_config(cfg: &ReelqConfig) -> Self {
        let t = cfg.transcode_or_default();
        Self {
            hard_limit: cfg.delivery_limit_bytes,
            working_threshold: cfg.working_threshold_bytes,
            default_bitrate: t.default_video_bitrate,
            reduced_bitrate: t.reduced_video_bitrate,
        }
    }
}

/// How one oversized file is cut. Derived per file, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub total_duration: f64,
    pub num_parts: usize,
    pub segment_duration: f64,
    pub bitrate: String,
}

impl ChunkPlan {
    /// `num_parts = ceil(file_size / working_threshold)`, at least 1.
    pub fn compute(
        file_size: u64,
        total_duration: f64,
        working_threshold: u64,
        bitrate: &str,
    ) -> Self {
        let threshold = working_threshold.max(1);
        let num_parts = (file_size.div_ceil(threshold)).max(1) as usize;
        Self {
            total_duration,
            num_parts,
            segment_duration: total_duration / num_parts as f64,
            bitrate: bitrate.to_string(),
        }
    }

    /// Same cut points at a different bitrate (used for the degrade retry).
    pub fn with_bitrate(&self, bitrate: &str) -> Self {
        Self {
            bitrate: bitrate.to_string(),
            ..self.clone()
        }
    }

    pub fn part_start(&self, index: usize) -> f64 {
        index as f64 * self.segment_duration
    }
}

/// Output path of part `index` (0-based) for `input`, inside `out_dir`.
pub fn part_path(input: &Path, out_dir: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string());
    out_dir.join(format!("{}_part{}.mp4", stem, index + 1))
}

/// Drives the probe and transcoder collaborators to split one file.
#[derive(Clone)]
pub struct Chunker {
    probe: Arc<dyn DurationProbe>,
    transcoder: Arc<dyn Transcoder>,
    limits: ChunkLimits,
}

impl Chunker {
    pub fn new(
        probe: Arc<dyn DurationProbe>,
        transcoder: Arc<dyn Transcoder>,
        limits: ChunkLimits,
    ) -> Self {
        Self {
            probe,
            transcoder,
            limits,
        }
    }

    /// Split `file` into delivery-safe parts written to `out_dir`.
    ///
    /// Returns `[file]` unchanged when it already fits or its duration is zero,
    /// and an empty list when the file cannot be split. Stops producing parts
    /// once `cancel` is signaled.
    pub async fn split(&self, file: &Path, out_dir: &Path, cancel: &CancelToken) -> Vec<PathBuf> {
        let file_size = match tokio::fs::metadata(file).await {
            Ok(m) => m.len(),
            Err(e) => {
                tracing::warn!(path = %file.display(), "cannot stat file to split: {}", e);
                return Vec::new();
            }
        };
        if file_size <= self.limits.hard_limit {
            return vec![file.to_path_buf()];
        }

        let duration = match self.probe.duration_secs(file).await {
            Ok(d) if d.is_finite() && d >= 0.0 => d,
            Ok(d) => {
                tracing::warn!(path = %file.display(), duration = d, "unusable duration, cannot split");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), "duration probe failed: {}", e);
                return Vec::new();
            }
        };
        if duration == 0.0 {
            return vec![file.to_path_buf()];
        }

        let plan = ChunkPlan::compute(
            file_size,
            duration,
            self.limits.working_threshold,
            &self.limits.default_bitrate,
        );
        tracing::info!(
            path = %file.display(),
            bytes = file_size,
            parts = plan.num_parts,
            segment_secs = plan.segment_duration,
            "splitting oversized media"
        );

        let mut accepted = Vec::with_capacity(plan.num_parts);
        for index in 0..plan.num_parts {
            if cancel.is_cancelled() {
                tracing::debug!(part = index + 1, "split stopped by cancellation");
                break;
            }
            let output = part_path(file, out_dir, index);
            if let Some(path) = self.produce_part(file, &output, &plan, index).await {
                accepted.push(path);
            }
        }
        accepted
    }

    /// Encode one part, retrying once at the reduced bitrate if it overshoots.
    async fn produce_part(
        &self,
        input: &Path,
        output: &Path,
        plan: &ChunkPlan,
        index: usize,
    ) -> Option<PathBuf> {
        let mut produced = self.encode(input, output, plan, index).await;

        let overshoot = match produced {
            Some((_, size)) if size > self.limits.hard_limit => Some(size),
            _ => None,
        };
        if let Some(size) = overshoot {
            tracing::debug!(
                part = index + 1,
                bytes = size,
                bitrate = %self.limits.reduced_bitrate,
                "part over limit, re-encoding at reduced bitrate"
            );
            let reduced = plan.with_bitrate(&self.limits.reduced_bitrate);
            produced = self.encode(input, output, &reduced, index).await;
        }

        match produced {
            Some((path, size)) if size <= self.limits.hard_limit => Some(path),
            Some((path, size)) => {
                tracing::warn!(part = index + 1, bytes = size, "part still over limit, discarding");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
            None => {
                tracing::warn!(part = index + 1, "part was not produced, discarding");
                let _ = tokio::fs::remove_file(output).await;
                None
            }
        }
    }

    /// Run the transcoder; Some((path, size)) if a non-empty file came out.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        plan: &ChunkPlan,
        index: usize,
    ) -> Option<(PathBuf, u64)> {
        let req = TranscodeRequest {
            input,
            output,
            start_secs: plan.part_start(index),
            duration_secs: plan.segment_duration,
            video_bitrate: &plan.bitrate,
        };
        let path = match self.transcoder.transcode(&req).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(part = index + 1, "transcode failed: {}", e);
                return None;
            }
        };
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.len() > 0 => Some((path, m.len())),
            _ => None,
        }
    }
}
