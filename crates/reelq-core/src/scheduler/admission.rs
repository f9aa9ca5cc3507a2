//! The scheduler handle: admission, cancellation, queue queries and shutdown.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::error::{AdmissionError, JobError};
use super::job::{Admission, Job, JobOutcome, QueuePosition, SchedulerSnapshot, Ticket, UserId};
use super::pipeline::PipelineContext;
use super::pool::WorkerPool;
use super::slots::{Placement, SlotBook};
use super::status;
use crate::config::ReelqConfig;
use crate::delivery::{DeliveryChannel, StatusHandle};
use crate::fetch::ContentFetcher;
use crate::media::Chunker;
use crate::url_model::ContentRef;

/// Sizing and limits for a scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Files above this many bytes are split before delivery.
    pub delivery_limit: u64,
    pub delivery_pause: Duration,
    pub work_root: Option<PathBuf>,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &ReelqConfig) -> Self {
        Self {
            workers: cfg.max_workers,
            queue_capacity: cfg.max_queue,
            delivery_limit: cfg.delivery_limit_bytes,
            delivery_pause: Duration::from_millis(cfg.delivery_pause_ms),
            work_root: cfg.work_dir.clone(),
        }
    }
}

/// External services a job talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub delivery: Arc<dyn DeliveryChannel>,
    pub chunker: Chunker,
}

/// State shared by the handle and the workers.
pub(crate) struct Shared {
    book: Mutex<SlotBook>,
    ready: mpsc::UnboundedSender<Job>,
    active: watch::Sender<usize>,
    /// Set once shutdown gives up waiting; running pipelines are then aborted.
    halt: watch::Sender<bool>,
    ctx: Arc<PipelineContext>,
}

impl Shared {
    fn book(&self) -> MutexGuard<'_, SlotBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Resolves once shutdown has asked running pipelines to be aborted.
    pub(crate) async fn halted(&self) {
        let mut rx = self.halt.subscribe();
        let _ = rx.wait_for(|h| *h).await;
    }

    fn dispatch(&self, job: Job) {
        if let Err(mpsc::error::SendError(mut job)) = self.ready.send(job) {
            tracing::warn!(user = job.user, "worker pool is not running, dropping job");
            {
                let mut book = self.book();
                book.forget(job.user);
                self.active.send_replace(book.active_len());
            }
            job.notify(JobOutcome::Failed(JobError::InternalFault(
                "worker pool is not running".to_string(),
            )));
        }
    }

    /// Free `user`'s slot, then announce and dispatch promoted jobs in FIFO order.
    pub(crate) async fn finish(&self, user: UserId) {
        let promoted = {
            let mut book = self.book();
            let promoted = book.release(user);
            self.active.send_replace(book.active_len());
            promoted
        };
        for job in promoted {
            tracing::info!(user = job.user, "promoted from waiting queue");
            self.ctx.publish(&job.status, &status::your_turn()).await;
            self.dispatch(job);
        }
    }
}

/// Cheap, cloneable handle to a running scheduler.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(settings: SchedulerSettings, collab: Collaborators) -> (Scheduler, WorkerPool) {
        let book = SlotBook::new(settings.workers, settings.queue_capacity);
        let workers = book.workers();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (active, _) = watch::channel(0usize);
        let (halt, _) = watch::channel(false);
        let ctx = Arc::new(PipelineContext {
            fetcher: collab.fetcher,
            delivery: collab.delivery,
            chunker: collab.chunker,
            delivery_limit: settings.delivery_limit,
            delivery_pause: settings.delivery_pause,
            work_root: settings.work_root,
        });
        let shared = Arc::new(Shared {
            book: Mutex::new(book),
            ready: ready_tx,
            active,
            halt,
            ctx,
        });
        let pool = WorkerPool::spawn(workers, Arc::clone(&shared), ready_rx);
        tracing::info!(workers, queue = settings.queue_capacity, "scheduler started");
        (Scheduler { shared }, pool)
    }

    /// Admit a job for `user`: run it now if a slot is free, otherwise queue it.
    pub fn submit(
        &self,
        user: UserId,
        reference: ContentRef,
        status: StatusHandle,
    ) -> Result<Ticket, AdmissionError> {
        let (job, completion) = Job::new(user, reference, status);
        let placement = {
            let mut book = self.shared.book();
            let placement = book.admit(job);
            self.shared.active.send_replace(book.active_len());
            placement
        };
        let admission = match placement {
            Ok(Placement::Run(job)) => {
                tracing::info!(user, url = %job.reference, "job admitted");
                self.shared.dispatch(job);
                Admission::Immediate
            }
            Ok(Placement::Queued(pos)) => {
                tracing::info!(user, position = pos, "job queued");
                Admission::Queued(pos)
            }
            Err(e) => {
                tracing::debug!(user, "submission rejected: {}", e);
                return Err(e);
            }
        };
        Ok(Ticket {
            admission,
            completion,
        })
    }

    /// Request cancellation of `user`'s running job. Returns false when the
    /// user has nothing running; waiting jobs cannot be cancelled.
    pub fn cancel(&self, user: UserId) -> bool {
        let hit = self.shared.book().cancel(user);
        if hit {
            tracing::info!(user, "cancellation requested");
        }
        hit
    }

    pub fn position_of(&self, user: UserId) -> QueuePosition {
        self.shared.book().position_of(user)
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let book = self.shared.book();
        SchedulerSnapshot {
            active: book.active_len(),
            queued: book.queued_len(),
            workers: book.workers(),
            queue_capacity: book.queue_capacity(),
        }
    }

    /// Resolves once no job is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stop the scheduler: refuse new submissions, drop waiting jobs and
    /// cancel running ones. Jobs that do not reach a checkpoint within `grace`
    /// are aborted; every job still gets its terminal status and outcome.
    pub async fn shutdown(&self, pool: WorkerPool, grace: Duration) {
        let (signalled, dropped) = {
            let mut book = self.shared.book();
            let dropped = book.close();
            (book.cancel_all(), dropped)
        };
        tracing::info!(running = signalled, waiting = dropped.len(), "scheduler shutting down");
        for mut job in dropped {
            self.shared
                .ctx
                .publish(&job.status, &status::terminal(&JobOutcome::Cancelled))
                .await;
            job.notify(JobOutcome::Cancelled);
        }
        if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
            tracing::warn!("jobs still running after {:?}, aborting them", grace);
            self.shared.halt.send_replace(true);
            if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
                tracing::error!("workers did not report aborted jobs");
            }
        }
        pool.abort().await;
    }
}
