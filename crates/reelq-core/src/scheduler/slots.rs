//! Active-job registry and bounded waiting queue.
//!
//! `SlotBook` is the single source of truth for who is running and who is
//! waiting. It is plain synchronous data; the scheduler keeps it behind one
//! mutex and never holds that lock across an await.

use std::collections::{HashMap, VecDeque};

use super::error::AdmissionError;
use super::job::{Job, QueuePosition, UserId};
use crate::control::CancelToken;

/// Result of admitting a job.
#[derive(Debug)]
pub(crate) enum Placement {
    /// A slot was reserved; the caller must dispatch the job.
    Run(Job),
    /// Appended to the waiting queue at this 1-based position.
    Queued(usize),
}

#[derive(Debug)]
pub(crate) struct SlotBook {
    workers: usize,
    queue_capacity: usize,
    /// Running users and their cancel tokens.
    active: HashMap<UserId, CancelToken>,
    waiting: VecDeque<Job>,
    closed: bool,
}

impl SlotBook {
    /// `workers` is clamped to at least one.
    pub(crate) fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity,
            active: HashMap::with_capacity(workers),
            waiting: VecDeque::with_capacity(queue_capacity),
            closed: false,
        }
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn queued_len(&self) -> usize {
        self.waiting.len()
    }

    fn is_waiting(&self, user: UserId) -> bool {
        self.waiting.iter().any(|j| j.user == user)
    }

    /// Reserve a slot for the job or queue it. Rejects a user that is already
    /// running or waiting, and rejects when the queue is at capacity.
    pub(crate) fn admit(&mut self, job: Job) -> Result<Placement, AdmissionError> {
        if self.closed {
            return Err(AdmissionError::ShuttingDown);
        }
        if self.active.contains_key(&job.user) || self.is_waiting(job.user) {
            return Err(AdmissionError::AlreadyInProgress);
        }
        if self.active.len() < self.workers {
            self.active.insert(job.user, job.cancel.clone());
            return Ok(Placement::Run(job));
        }
        if self.waiting.len() >= self.queue_capacity {
            return Err(AdmissionError::QueueFull);
        }
        self.waiting.push_back(job);
        Ok(Placement::Queued(self.waiting.len()))
    }

    /// Free `user`'s slot and promote waiting jobs, oldest first, while slots
    /// are free. Promoted jobs are already registered as active and are
    /// returned in dispatch order.
    pub(crate) fn release(&mut self, user: UserId) -> Vec<Job> {
        self.active.remove(&user);
        let mut promoted = Vec::new();
        while self.active.len() < self.workers {
            let Some(job) = self.waiting.pop_front() else {
                break;
            };
            self.active.insert(job.user, job.cancel.clone());
            promoted.push(job);
        }
        promoted
    }

    /// Drop a registration without promoting anyone.
    pub(crate) fn forget(&mut self, user: UserId) {
        self.active.remove(&user);
    }

    /// Set the cancel flag of `user`'s running job. Waiting jobs are not
    /// affected. Returns false when the user has no running job.
    pub(crate) fn cancel(&self, user: UserId) -> bool {
        match self.active.get(&user) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running job; returns how many were signalled.
    pub(crate) fn cancel_all(&self) -> usize {
        for token in self.active.values() {
            token.cancel();
        }
        self.active.len()
    }

    /// Stop admitting and hand back every waiting job.
    pub(crate) fn close(&mut self) -> Vec<Job> {
        self.closed = true;
        self.waiting.drain(..).collect()
    }

    pub(crate) fn position_of(&self, user: UserId) -> QueuePosition {
        if self.active.contains_key(&user) {
            return QueuePosition::InProgress;
        }
        match self.waiting.iter().position(|j| j.user == user) {
            Some(idx) => QueuePosition::QueuedAt(idx + 1),
            None => QueuePosition::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::StatusHandle;
    use crate::url_model::ContentRef;

    fn job(user: UserId) -> Job {
        let reference = ContentRef::parse("https://www.instagram.com/reel/abc123/").unwrap();
        let (job, _rx) = Job::new(user, reference, StatusHandle::new(format!("u{}", user), 1));
        job
    }

    fn run(p: Result<Placement, AdmissionError>) -> Job {
        match p {
            Ok(Placement::Run(j)) => j,
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn admits_up_to_worker_count_then_queues() {
        let mut book = SlotBook::new(2, 3);
        run(book.admit(job(1)));
        run(book.admit(job(2)));
        assert!(matches!(book.admit(job(3)), Ok(Placement::Queued(1))));
        assert!(matches!(book.admit(job(4)), Ok(Placement::Queued(2))));
        assert_eq!(book.active_len(), 2);
        assert_eq!(book.queued_len(), 2);
    }

    #[test]
    fn same_user_is_rejected_while_running_or_waiting() {
        let mut book = SlotBook::new(1, 5);
        run(book.admit(job(7)));
        assert_eq!(book.admit(job(7)).unwrap_err(), AdmissionError::AlreadyInProgress);
        assert!(matches!(book.admit(job(8)), Ok(Placement::Queued(1))));
        assert_eq!(book.admit(job(8)).unwrap_err(), AdmissionError::AlreadyInProgress);
        assert_eq!(book.queued_len(), 1);
    }

    #[test]
    fn full_queue_rejects_without_side_effects() {
        let mut book = SlotBook::new(2, 1);
        run(book.admit(job(1)));
        run(book.admit(job(2)));
        assert!(matches!(book.admit(job(3)), Ok(Placement::Queued(1))));
        assert_eq!(book.admit(job(4)).unwrap_err(), AdmissionError::QueueFull);
        assert_eq!(book.position_of(4), QueuePosition::NotFound);
        assert_eq!(book.active_len(), 2);
        assert_eq!(book.queued_len(), 1);
    }

    #[test]
    fn zero_capacity_queue_rejects_when_busy() {
        let mut book = SlotBook::new(1, 0);
        run(book.admit(job(1)));
        assert_eq!(book.admit(job(2)).unwrap_err(), AdmissionError::QueueFull);
    }

    #[test]
    fn release_promotes_in_fifo_order() {
        let mut book = SlotBook::new(1, 5);
        run(book.admit(job(1)));
        book.admit(job(2)).unwrap();
        book.admit(job(3)).unwrap();

        let promoted = book.release(1);
        assert_eq!(promoted.iter().map(|j| j.user).collect::<Vec<_>>(), vec![2]);
        assert_eq!(book.position_of(2), QueuePosition::InProgress);
        assert_eq!(book.position_of(3), QueuePosition::QueuedAt(1));

        let promoted = book.release(2);
        assert_eq!(promoted[0].user, 3);
        assert!(book.release(3).is_empty());
        assert_eq!(book.active_len(), 0);
    }

    #[test]
    fn release_fills_every_free_slot() {
        let mut book = SlotBook::new(3, 5);
        run(book.admit(job(1)));
        run(book.admit(job(2)));
        run(book.admit(job(3)));
        book.admit(job(4)).unwrap();
        book.admit(job(5)).unwrap();
        book.forget(2);
        let promoted = book.release(1);
        assert_eq!(promoted.iter().map(|j| j.user).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(book.active_len(), 3);
        assert_eq!(book.queued_len(), 0);
    }

    #[test]
    fn positions_are_one_based_and_shift_after_promotion() {
        let mut book = SlotBook::new(1, 5);
        run(book.admit(job(1)));
        book.admit(job(2)).unwrap();
        book.admit(job(3)).unwrap();
        assert_eq!(book.position_of(3), QueuePosition::QueuedAt(2));
        book.release(1);
        assert_eq!(book.position_of(3), QueuePosition::QueuedAt(1));
        assert_eq!(book.position_of(99), QueuePosition::NotFound);
    }

    #[test]
    fn cancel_only_reaches_running_jobs() {
        let mut book = SlotBook::new(1, 5);
        let running = run(book.admit(job(1)));
        book.admit(job(2)).unwrap();
        assert!(book.cancel(1));
        assert!(running.cancel.is_cancelled());
        assert!(!book.cancel(2));
        assert!(!book.cancel(3));
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let mut book = SlotBook::new(0, 1);
        assert_eq!(book.workers(), 1);
        run(book.admit(job(1)));
    }

    #[test]
    fn closed_book_rejects_and_returns_waiting_jobs() {
        let mut book = SlotBook::new(1, 5);
        run(book.admit(job(1)));
        book.admit(job(2)).unwrap();
        book.admit(job(3)).unwrap();

        let drained = book.close();
        assert_eq!(drained.iter().map(|j| j.user).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(book.admit(job(4)).unwrap_err(), AdmissionError::ShuttingDown);
        assert!(book.release(1).is_empty());
        assert_eq!(book.active_len(), 0);
    }
}
