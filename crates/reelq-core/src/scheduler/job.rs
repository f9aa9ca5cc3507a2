//! Job and admission types shared by the scheduler modules.

use tokio::sync::oneshot;

use super::error::JobError;
use crate::control::CancelToken;
use crate::delivery::StatusHandle;
use crate::url_model::ContentRef;

/// User identity; at most one job per user is in the system at a time.
pub type UserId = i64;

/// One user's request to fetch and deliver content.
#[derive(Debug)]
pub struct Job {
    pub user: UserId,
    pub reference: ContentRef,
    pub cancel: CancelToken,
    pub status: StatusHandle,
    pub(crate) done: Option<oneshot::Sender<JobOutcome>>,
}

impl Job {
    /// Creates a job and the receiver its terminal outcome will be sent to.
    pub(crate) fn new(
        user: UserId,
        reference: ContentRef,
        status: StatusHandle,
    ) -> (Self, oneshot::Receiver<JobOutcome>) {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            user,
            reference,
            cancel: CancelToken::new(),
            status,
            done: Some(tx),
        };
        (job, rx)
    }

    /// Report the terminal outcome to the submitter (if it is still listening).
    pub(crate) fn notify(&mut self, outcome: JobOutcome) {
        if let Some(tx) = self.done.take() {
            let _ = tx.send(outcome);
        }
    }
}

/// Terminal result of a job.
#[derive(Debug)]
pub enum JobOutcome {
    /// `delivered` items were sent (whole or as parts); `skipped` could not be split.
    Completed { delivered: usize, skipped: usize },
    Failed(JobError),
    Cancelled,
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Where an accepted submission went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the job is running.
    Immediate,
    /// Waiting at this 1-based queue position.
    Queued(usize),
}

/// Returned by a successful submit.
#[derive(Debug)]
pub struct Ticket {
    pub admission: Admission,
    /// Resolves with the job's terminal outcome.
    pub completion: oneshot::Receiver<JobOutcome>,
}

/// Answer to a queue position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    InProgress,
    /// 1-based position in the waiting queue.
    QueuedAt(usize),
    NotFound,
}

/// Point-in-time view of scheduler occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub active: usize,
    pub queued: usize,
    pub workers: usize,
    pub queue_capacity: usize,
}
