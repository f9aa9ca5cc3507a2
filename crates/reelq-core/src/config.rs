use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const MIB: u64 = 1024 * 1024;

/// Transcoder settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// ffmpeg binary (name on PATH or absolute path).
    pub ffmpeg: String,
    /// ffprobe binary (name on PATH or absolute path).
    pub ffprobe: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Target video bitrate for the first attempt at each part.
    pub default_video_bitrate: String,
    /// Target video bitrate for the single retry of an oversized part.
    pub reduced_video_bitrate: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            default_video_bitrate: "1500k".to_string(),
            reduced_video_bitrate: "750k".to_string(),
        }
    }
}

/// HTTP fetcher settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout.
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/reelq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelqConfig {
    /// Number of worker slots (jobs running at once).
    pub max_workers: usize,
    /// Capacity of the waiting queue.
    pub max_queue: usize,
    /// Hard size limit for a single delivered file, in bytes.
    pub delivery_limit_bytes: u64,
    /// Size each chunk part is planned against; must be below the hard limit
    /// to absorb re-encoding overshoot.
    pub working_threshold_bytes: u64,
    /// Pause after each delivered file, in milliseconds.
    pub delivery_pause_ms: u64,
    /// Root for per-job temp directories (None = system temp dir).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Root of the local inbox delivery channel (None = XDG data dir).
    #[serde(default)]
    pub inbox_dir: Option<PathBuf>,
    #[serde(default)]
    pub transcode: Option<TranscodeConfig>,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for ReelqConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_queue: 50,
            delivery_limit_bytes: 50 * MIB,
            working_threshold_bytes: 45 * MIB,
            delivery_pause_ms: 1000,
            work_dir: None,
            inbox_dir: None,
            transcode: None,
            http: None,
        }
    }
}

impl ReelqConfig {
    /// Reject settings the scheduler and chunker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }
        if self.working_threshold_bytes == 0 {
            anyhow::bail!("working_threshold_bytes must be greater than 0");
        }
        if self.working_threshold_bytes >= self.delivery_limit_bytes {
            anyhow::bail!(
                "working_threshold_bytes ({}) must be below delivery_limit_bytes ({})",
                self.working_threshold_bytes,
                self.delivery_limit_bytes
            );
        }
        Ok(())
    }

    pub fn transcode_or_default(&self) -> TranscodeConfig {
        self.transcode.clone().unwrap_or_default()
    }

    pub fn http_or_default(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    /// Inbox root: configured `inbox_dir` or `~/.local/share/reelq/inbox`.
    pub fn inbox_dir_or_default(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.inbox_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("reelq")?;
        Ok(xdg_dirs.get_data_home().join("inbox"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("reelq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ReelqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ReelqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ReelqConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
