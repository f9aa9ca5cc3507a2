//! Worker tasks: take dispatched jobs, run the pipeline, report, promote.
//!
//! Each job's pipeline runs in its own task so a panic surfaces as a
//! `JoinError` here instead of killing the worker. The worker then publishes
//! the terminal status, notifies the submitter and frees the slot, in that
//! order. A pipeline aborted by shutdown is reported as cancelled.

use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};

use super::admission::Shared;
use super::error::JobError;
use super::job::{Job, JobOutcome};
use super::pipeline::{self, JobSpec};
use super::status;

type ReadyQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

/// The running worker tasks. Dropping it leaves the workers running;
/// `Scheduler::shutdown` stops them.
pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub(crate) fn spawn(
        count: usize,
        shared: Arc<Shared>,
        ready: mpsc::UnboundedReceiver<Job>,
    ) -> Self {
        let ready: ReadyQueue = Arc::new(Mutex::new(ready));
        let mut workers = JoinSet::new();
        for id in 0..count {
            workers.spawn(worker_loop(id, Arc::clone(&shared), Arc::clone(&ready)));
        }
        Self { workers }
    }

    pub(crate) async fn abort(mut self) {
        self.workers.abort_all();
        while self.workers.join_next().await.is_some() {}
    }
}

async fn worker_loop(id: usize, shared: Arc<Shared>, ready: ReadyQueue) {
    loop {
        let next = {
            let mut rx = ready.lock().await;
            rx.recv().await
        };
        let Some(job) = next else {
            tracing::debug!(worker = id, "ready queue closed, worker exiting");
            break;
        };
        run_job(id, &shared, job).await;
    }
}

async fn run_job(worker: usize, shared: &Shared, mut job: Job) {
    let user = job.user;
    let spec = JobSpec {
        reference: job.reference.clone(),
        cancel: job.cancel.clone(),
        status: job.status.clone(),
    };
    tracing::info!(worker, user, url = %spec.reference, "job started");

    let ctx = Arc::clone(shared.context());
    let mut task = tokio::spawn(pipeline::run(ctx, spec));
    let outcome = tokio::select! {
        joined = &mut task => match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let detail = join_failure(e);
                tracing::error!(worker, user, "job task failed: {}", detail);
                JobOutcome::Failed(JobError::InternalFault(detail))
            }
        },
        _ = shared.halted() => {
            task.abort();
            // Resolves after the pipeline future, and with it the job dir, is dropped.
            match task.await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(worker, user, "job aborted by shutdown");
                    JobOutcome::Cancelled
                }
            }
        }
    };

    match &outcome {
        JobOutcome::Completed { delivered, skipped } => {
            tracing::info!(worker, user, delivered, skipped, "job completed")
        }
        JobOutcome::Cancelled => tracing::info!(worker, user, "job cancelled"),
        JobOutcome::Failed(e) => tracing::warn!(worker, user, "job failed: {}", e),
    }

    shared
        .context()
        .publish(&job.status, &status::terminal(&outcome))
        .await;
    job.notify(outcome);
    shared.finish(user).await;
}

fn join_failure(e: JoinError) -> String {
    if e.is_panic() {
        panic_message(e.into_panic())
    } else {
        "job task was aborted".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
