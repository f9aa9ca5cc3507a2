//! One job, start to finish: fetch, then deliver every item (splitting
//! oversized videos), with cancellation checkpoints between stages.
//!
//! The pipeline never publishes the terminal status itself; the worker does
//! that once per job so a panicking pipeline still ends with exactly one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use super::error::JobError;
use super::job::JobOutcome;
use super::status;
use crate::control::CancelToken;
use crate::delivery::{DeliveryChannel, StatusHandle};
use crate::fetch::{ContentFetcher, FetchError, MediaItem};
use crate::media::Chunker;
use crate::url_model::ContentRef;

/// Collaborators and limits every job runs with.
pub(crate) struct PipelineContext {
    pub(crate) fetcher: Arc<dyn ContentFetcher>,
    pub(crate) delivery: Arc<dyn DeliveryChannel>,
    pub(crate) chunker: Chunker,
    pub(crate) delivery_limit: u64,
    pub(crate) delivery_pause: Duration,
    /// Parent for per-job temp dirs; the system temp dir when None.
    pub(crate) work_root: Option<PathBuf>,
}

/// The parts of a job the pipeline needs.
#[derive(Debug, Clone)]
pub(crate) struct JobSpec {
    pub(crate) reference: ContentRef,
    pub(crate) cancel: CancelToken,
    pub(crate) status: StatusHandle,
}

#[derive(Debug, Default)]
struct Tally {
    delivered: usize,
    skipped: usize,
}

impl PipelineContext {
    /// Publish a progress status. Failures are logged and otherwise ignored.
    pub(crate) async fn publish(&self, handle: &StatusHandle, text: &str) {
        if let Err(e) = self.delivery.publish_status(handle, text).await {
            tracing::warn!(destination = %handle.destination, "status update failed: {}", e);
        }
    }

    fn job_dir(&self) -> Result<TempDir, JobError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reelq-job-");
        let dir = match &self.work_root {
            Some(root) => std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
            None => builder.tempdir(),
        };
        dir.map_err(|e| JobError::InternalFault(format!("cannot create work dir: {}", e)))
    }

    async fn deliver(
        &self,
        spec: &JobSpec,
        item: &MediaItem,
        path: &std::path::Path,
        caption: &str,
    ) -> Result<(), JobError> {
        self.delivery
            .deliver(&spec.status, path, item.kind, caption)
            .await?;
        if !self.delivery_pause.is_zero() {
            tokio::time::sleep(self.delivery_pause).await;
        }
        Ok(())
    }
}

/// Run a job to its outcome. The working directory is removed on every path
/// out of this function.
pub(crate) async fn run(ctx: Arc<PipelineContext>, spec: JobSpec) -> JobOutcome {
    match execute(&ctx, &spec).await {
        Ok(tally) => JobOutcome::Completed {
            delivered: tally.delivered,
            skipped: tally.skipped,
        },
        Err(JobError::Cancelled) => JobOutcome::Cancelled,
        Err(e) => JobOutcome::Failed(e),
    }
}

async fn execute(ctx: &PipelineContext, spec: &JobSpec) -> Result<Tally, JobError> {
    ctx.publish(&spec.status, &status::fetching(spec.reference.kind()))
        .await;
    spec.cancel.check()?;

    let work = ctx.job_dir()?;
    tracing::debug!(url = %spec.reference, dir = %work.path().display(), "fetching");
    let content = ctx.fetcher.fetch(&spec.reference, work.path()).await?;
    spec.cancel.check()?;

    if content.items.is_empty() {
        return Err(FetchError::NotFound("no media found".to_string()).into());
    }
    let total = content.items.len();
    ctx.publish(&spec.status, &status::found(total)).await;

    let mut tally = Tally::default();
    for (index, item) in content.items.iter().enumerate() {
        spec.cancel.check()?;
        let caption = status::caption(&content, index, total);
        let size = tokio::fs::metadata(&item.path)
            .await
            .map_err(|e| {
                JobError::InternalFault(format!("{}: {}", item.path.display(), e))
            })?
            .len();

        if size <= ctx.delivery_limit {
            ctx.deliver(spec, item, &item.path, &caption).await?;
            tally.delivered += 1;
            continue;
        }

        tracing::info!(
            file = %item.path.display(),
            size,
            limit = ctx.delivery_limit,
            "item over delivery limit, splitting"
        );
        ctx.publish(&spec.status, &status::splitting()).await;
        let parts = ctx.chunker.split(&item.path, work.path(), &spec.cancel).await;
        spec.cancel.check()?;

        // A zero-duration file comes back unchanged and is still over the limit.
        if parts.iter().all(|part| part == &item.path) {
            let err = JobError::SplitFailed {
                item: index + 1,
                total,
            };
            tracing::warn!(file = %item.path.display(), "{}", err);
            ctx.publish(&spec.status, &err.to_string()).await;
            tally.skipped += 1;
            continue;
        }

        let count = parts.len();
        for (p, part) in parts.iter().enumerate() {
            spec.cancel.check()?;
            ctx.publish(&spec.status, &status::sending_part(p + 1, count))
                .await;
            let part_caption = status::part_caption(&caption, p, count);
            ctx.deliver(spec, item, part, &part_caption).await?;
            if part != &item.path {
                let _ = tokio::fs::remove_file(part).await;
            }
        }
        tally.delivered += 1;
    }

    Ok(tally)
}
