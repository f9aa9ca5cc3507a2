//! Delivery channel: where status updates and finished files go.
//!
//! A chat bot implements `DeliveryChannel` on top of its messaging API;
//! `InboxDelivery` writes everything to a local directory tree.

mod inbox;

pub use inbox::InboxDelivery;

use async_trait::async_trait;
use std::path::Path;

use crate::fetch::MediaKind;

/// Opaque reference to a job's destination and its status message.
///
/// `status_id` names the single status message a job keeps updating, so a
/// channel that edits messages in place knows which one to edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusHandle {
    pub destination: String,
    pub status_id: u64,
}

impl StatusHandle {
    pub fn new(destination: impl Into<String>, status_id: u64) -> Self {
        Self {
            destination: destination.into(),
            status_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("delivery to {destination} failed: {detail}")]
pub struct DeliveryError {
    pub destination: String,
    pub detail: String,
}

impl DeliveryError {
    pub fn new(handle: &StatusHandle, detail: impl Into<String>) -> Self {
        Self {
            destination: handle.destination.clone(),
            detail: detail.into(),
        }
    }
}

/// Posts status text and sends files to an end user.
///
/// Both calls must finish (or fail) before the pipeline moves on.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        handle: &StatusHandle,
        file: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), DeliveryError>;

    async fn publish_status(&self, handle: &StatusHandle, text: &str) -> Result<(), DeliveryError>;
}
