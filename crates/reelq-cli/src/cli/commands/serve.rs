//! `reelq serve` – run the scheduler and answer control requests until Ctrl-C.

use anyhow::Result;
use reelq_core::config::ReelqConfig;
use reelq_core::delivery::InboxDelivery;
use reelq_core::fetch::HttpFetcher;
use reelq_core::media::ffmpeg::{Ffmpeg, Ffprobe};
use reelq_core::media::{ChunkLimits, Chunker};
use reelq_core::scheduler::{Collaborators, Scheduler, SchedulerSettings};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::control_socket::{self, ControlState};

/// Running jobs get this long to reach a checkpoint after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run_serve(
    mut cfg: ReelqConfig,
    workers: Option<usize>,
    queue: Option<usize>,
) -> Result<()> {
    if let Some(n) = workers {
        cfg.max_workers = n;
    }
    if let Some(n) = queue {
        cfg.max_queue = n;
    }
    cfg.validate()?;

    let transcode = cfg.transcode_or_default();
    let inbox_dir = cfg.inbox_dir_or_default()?;
    let collab = Collaborators {
        fetcher: Arc::new(HttpFetcher::new(cfg.http_or_default())),
        delivery: Arc::new(
            InboxDelivery::new(&inbox_dir).with_max_file_bytes(cfg.delivery_limit_bytes),
        ),
        chunker: Chunker::new(
            Arc::new(Ffprobe::new(transcode.ffprobe.clone())),
            Arc::new(Ffmpeg::new(transcode)),
            ChunkLimits::from_config(&cfg),
        ),
    };

    let (scheduler, pool) = Scheduler::start(SchedulerSettings::from_config(&cfg), collab);

    let socket_path = reelq_core::control::default_control_socket_path()?;
    let listener = control_socket::spawn_control_listener(
        Arc::new(ControlState::new(scheduler.clone())),
        &socket_path,
    )?;
    tracing::debug!(path = %socket_path.display(), "control socket listening");
    println!(
        "reelq serving: {} workers, queue {}, inbox {}",
        cfg.max_workers,
        cfg.max_queue,
        inbox_dir.display()
    );
    println!("control socket: {}", socket_path.display());
    if let Ok(log) = reelq_core::logging::log_file_path() {
        println!("log file: {}", log.display());
    }

    tokio::signal::ctrl_c().await?;
    println!("shutting down...");
    listener.abort();
    let _ = std::fs::remove_file(&socket_path);
    scheduler.shutdown(pool, SHUTDOWN_GRACE).await;
    tracing::info!("service stopped");
    Ok(())
}
