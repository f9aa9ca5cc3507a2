//! Scheduler error taxonomy.
//!
//! Admission errors are returned synchronously from `submit`. Job errors are
//! produced inside the pipeline and only ever surface as a terminal status
//! and a `JobOutcome::Failed`.

use crate::control::JobCancelled;
use crate::delivery::DeliveryError;
use crate::fetch::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("you already have a download in progress")]
    AlreadyInProgress,
    #[error("the waiting queue is full, please try again later")]
    QueueFull,
    #[error("the service is shutting down")]
    ShuttingDown,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    FetchFailed(FetchError),
    #[error("unsupported content: {0}")]
    UnsupportedContent(String),
    #[error("could not split item {item}/{total}; the file might be corrupted")]
    SplitFailed { item: usize, total: usize },
    #[error("{0}")]
    DeliveryFailed(#[from] DeliveryError),
    #[error("cancelled")]
    Cancelled,
    #[error("unexpected error: {0}")]
    InternalFault(String),
}

impl From<FetchError> for JobError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Unsupported(detail) => JobError::UnsupportedContent(detail),
            other => JobError::FetchFailed(other),
        }
    }
}

impl From<JobCancelled> for JobError {
    fn from(_: JobCancelled) -> Self {
        JobError::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_fetch_maps_to_unsupported_content() {
        let e: JobError = FetchError::Unsupported("story".into()).into();
        assert!(matches!(e, JobError::UnsupportedContent(ref s) if s == "story"));
        let e: JobError = FetchError::NotFound("gone".into()).into();
        assert!(matches!(e, JobError::FetchFailed(FetchError::NotFound(_))));
    }

    #[test]
    fn fetch_failure_text_carries_collaborator_detail() {
        let e: JobError = FetchError::PrivateOrRestricted("account is private".into()).into();
        assert_eq!(e.to_string(), "content is private or restricted: account is private");
    }
}
