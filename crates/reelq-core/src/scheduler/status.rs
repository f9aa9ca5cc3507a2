//! User-facing status texts and delivery captions.

use super::error::{AdmissionError, JobError};
use super::job::{Admission, JobOutcome};
use crate::fetch::FetchedContent;
use crate::url_model::ContentKind;

pub fn fetching(kind: ContentKind) -> String {
    format!("Downloading {}...", kind.as_str())
}

pub fn found(count: usize) -> String {
    format!("Found {} media file(s). Sending...", count)
}

pub fn splitting() -> String {
    "Video is too large to send in one piece. Splitting into parts...".to_string()
}

pub fn sending_part(part: usize, parts: usize) -> String {
    format!("Sending part {}/{}...", part, parts)
}

pub fn your_turn() -> String {
    "Your turn has arrived! Starting download...".to_string()
}

/// Reply to a submission, shown by whatever front end accepted it.
pub fn admitted(admission: Admission) -> String {
    match admission {
        Admission::Immediate => "Download started.".to_string(),
        Admission::Queued(pos) => format!(
            "All workers are busy. You are #{} in line; your download starts automatically when it is your turn.",
            pos
        ),
    }
}

pub fn rejected(err: AdmissionError) -> String {
    match err {
        AdmissionError::AlreadyInProgress => {
            "You already have a download in progress. Wait for it to finish or cancel it first."
                .to_string()
        }
        AdmissionError::QueueFull => {
            "The waiting queue is full. Please try again later.".to_string()
        }
        AdmissionError::ShuttingDown => {
            "The service is shutting down and not taking new downloads.".to_string()
        }
    }
}

/// The one terminal status every job ends with.
pub fn terminal(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { delivered, skipped: 0 } => {
            format!("Download completed! Sent {} media file(s).", delivered)
        }
        JobOutcome::Completed { delivered, skipped } => format!(
            "Download completed. Sent {} media file(s); {} could not be split and were skipped.",
            delivered, skipped
        ),
        JobOutcome::Failed(JobError::Cancelled) | JobOutcome::Cancelled => {
            "Download cancelled.".to_string()
        }
        JobOutcome::Failed(err) => format!("Download failed: {}", err),
    }
}

/// Caption for item `index` (0-based) of `total`.
pub fn caption(content: &FetchedContent, index: usize, total: usize) -> String {
    let mut text = format!("Downloaded from {}", content.source);
    if let Some(owner) = content.owner.as_deref() {
        text.push_str(&format!("\nOwner: @{}", owner));
    }
    text.push_str(&format!("\nItem {}/{}", index + 1, total));
    text
}

/// Caption for part `part` (0-based) of `parts` of a split item.
pub fn part_caption(base: &str, part: usize, parts: usize) -> String {
    format!("{} - Part {}/{}", base, part + 1, parts)
}
