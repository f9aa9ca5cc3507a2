//! In-memory collaborators for scheduler integration tests.

use async_trait::async_trait;
use reelq_core::delivery::{DeliveryChannel, DeliveryError, StatusHandle};
use reelq_core::fetch::{ContentFetcher, FetchError, FetchedContent, MediaItem, MediaKind};
use reelq_core::media::{
    ChunkLimits, Chunker, DurationProbe, MediaError, TranscodeRequest, Transcoder,
};
use reelq_core::scheduler::{Collaborators, SchedulerSettings};
use reelq_core::url_model::ContentRef;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Fetcher that blocks every call until the test releases a permit.
///
/// Writes one small video named after the URL's last path segment. A URL
/// containing `panic` makes the fetch panic once released.
pub struct GatedFetcher {
    gate: Semaphore,
    started: Mutex<Vec<String>>,
    dirs: Mutex<Vec<PathBuf>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Decrements the in-flight count however the fetch ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GatedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            started: Mutex::new(Vec::new()),
            dirs: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Most fetches that were ever running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Let `n` blocked (or future) fetches proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// URLs in the order their fetch began.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Working directories handed to the fetcher.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for GatedFetcher {
    async fn fetch(
        &self,
        reference: &ContentRef,
        work_dir: &Path,
    ) -> Result<FetchedContent, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);
        self.started.lock().unwrap().push(reference.to_string());
        self.dirs.lock().unwrap().push(work_dir.to_path_buf());
        self.gate
            .acquire()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?
            .forget();
        if reference.as_str().contains("panic") {
            panic!("fetcher exploded");
        }
        let name = reference
            .url()
            .path_segments()
            .and_then(|s| s.last())
            .unwrap_or("clip.mp4")
            .to_string();
        let path = work_dir.join(name);
        std::fs::write(&path, b"tiny video").map_err(|e| FetchError::Transient(e.to_string()))?;
        Ok(FetchedContent {
            items: vec![MediaItem {
                path,
                kind: MediaKind::Video,
            }],
            owner: Some("tester".into()),
            source: reference.source().to_string(),
        })
    }
}

/// Fetcher that never returns, like a transfer hung on a dead peer.
#[derive(Default)]
pub struct StuckFetcher {
    dirs: Mutex<Vec<PathBuf>>,
}

impl StuckFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for StuckFetcher {
    async fn fetch(
        &self,
        _reference: &ContentRef,
        work_dir: &Path,
    ) -> Result<FetchedContent, FetchError> {
        self.dirs.lock().unwrap().push(work_dir.to_path_buf());
        std::future::pending().await
    }
}

/// Records every status update and delivered file.
#[derive(Default)]
pub struct RecordingDelivery {
    statuses: Mutex<Vec<(String, String)>>,
    files: Mutex<Vec<(String, String)>>,
}

impl RecordingDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Status texts posted for `destination`, in order.
    pub fn statuses_for(&self, destination: &str) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// File names delivered to `destination`, in order.
    pub fn files_for(&self, destination: &str) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn deliver(
        &self,
        handle: &StatusHandle,
        file: &Path,
        _kind: MediaKind,
        _caption: &str,
    ) -> Result<(), DeliveryError> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DeliveryError::new(handle, "no file name"))?;
        self.files
            .lock()
            .unwrap()
            .push((handle.destination.clone(), name));
        Ok(())
    }

    async fn publish_status(&self, handle: &StatusHandle, text: &str) -> Result<(), DeliveryError> {
        self.statuses
            .lock()
            .unwrap()
            .push((handle.destination.clone(), text.to_string()));
        Ok(())
    }
}

/// Probe and transcoder for tests that never split.
pub struct NoMedia;

#[async_trait]
impl DurationProbe for NoMedia {
    async fn duration_secs(&self, _file: &Path) -> Result<f64, MediaError> {
        Err(MediaError::Probe("no media engine in tests".into()))
    }
}

#[async_trait]
impl Transcoder for NoMedia {
    async fn transcode(&self, _req: &TranscodeRequest<'_>) -> Result<PathBuf, MediaError> {
        Err(MediaError::Transcode {
            message: "no media engine in tests".into(),
            stderr: None,
        })
    }
}

pub fn chunker() -> Chunker {
    Chunker::new(
        Arc::new(NoMedia),
        Arc::new(NoMedia),
        ChunkLimits {
            hard_limit: 1024,
            working_threshold: 900,
            default_bitrate: "1500k".into(),
            reduced_bitrate: "750k".into(),
        },
    )
}

pub fn settings(workers: usize, queue_capacity: usize, work_root: &Path) -> SchedulerSettings {
    SchedulerSettings {
        workers,
        queue_capacity,
        delivery_limit: 1024,
        delivery_pause: Duration::ZERO,
        work_root: Some(work_root.to_path_buf()),
    }
}

pub fn collaborators(fetcher: Arc<dyn ContentFetcher>, delivery: Arc<RecordingDelivery>) -> Collaborators {
    Collaborators {
        fetcher,
        delivery,
        chunker: chunker(),
    }
}

pub fn reference(name: &str) -> ContentRef {
    ContentRef::parse(&format!("https://cdn.example.com/{}.mp4", name)).unwrap()
}

pub fn handle(user: i64) -> StatusHandle {
    StatusHandle::new(format!("user{}", user), user as u64)
}

/// Poll `cond` every few milliseconds until it holds; panics after 5s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
