//! Job scheduler: bounded worker pool with a FIFO waiting queue.
//!
//! At most one job per user is admitted. Up to `workers` jobs run at once;
//! the rest wait in a bounded queue and are promoted oldest-first as slots
//! free up. Each job runs the fetch → split → deliver pipeline and ends with
//! exactly one terminal status.

mod admission;
mod error;
mod job;
mod pipeline;
mod pool;
mod slots;
pub mod status;

pub use admission::{Collaborators, Scheduler, SchedulerSettings};
pub use error::{AdmissionError, JobError};
pub use job::{Admission, Job, JobOutcome, QueuePosition, SchedulerSnapshot, Ticket, UserId};
pub use pool::WorkerPool;
