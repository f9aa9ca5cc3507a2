//! Local inbox delivery: one directory per destination.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/<destination>/0001_<file>        delivered file
//! <root>/<destination>/0001_<file>.txt    its caption
//! <root>/<destination>/status.log         "[<status_id>] <text>" per update
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

use super::{DeliveryChannel, DeliveryError, StatusHandle};
use crate::fetch::MediaKind;
use crate::url_model::sanitize_filename;

#[derive(Debug)]
pub struct InboxDelivery {
    root: PathBuf,
    /// Refuse files larger than this, like a chat API would.
    max_file_bytes: Option<u64>,
    seq: AtomicU64,
}

impl InboxDelivery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: None,
            seq: AtomicU64::new(0),
        }
    }

    pub fn with_max_file_bytes(mut self, limit: u64) -> Self {
        self.max_file_bytes = Some(limit);
        self
    }

    async fn destination_dir(&self, handle: &StatusHandle) -> Result<PathBuf, DeliveryError> {
        let name = sanitize_filename(&handle.destination);
        let name = if name.is_empty() { "unknown".to_string() } else { name };
        let dir = self.root.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DeliveryError::new(handle, format!("create {}: {}", dir.display(), e)))?;
        Ok(dir)
    }
}

#[async_trait]
impl DeliveryChannel for InboxDelivery {
    async fn deliver(
        &self,
        handle: &StatusHandle,
        file: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let size = tokio::fs::metadata(file)
            .await
            .map_err(|e| DeliveryError::new(handle, format!("stat {}: {}", file.display(), e)))?
            .len();
        if let Some(limit) = self.max_file_bytes {
            if size > limit {
                return Err(DeliveryError::new(
                    handle,
                    format!("file too large: {} bytes (limit {})", size, limit),
                ));
            }
        }

        let dir = self.destination_dir(handle).await?;
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let base = file
            .file_name()
            .map(|s| sanitize_filename(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("item.{}", kind.default_extension()));
        let target = dir.join(format!("{:04}_{}", n, base));

        tokio::fs::copy(file, &target)
            .await
            .map_err(|e| DeliveryError::new(handle, format!("copy to {}: {}", target.display(), e)))?;
        let mut caption_path = target.clone().into_os_string();
        caption_path.push(".txt");
        tokio::fs::write(&caption_path, caption)
            .await
            .map_err(|e| DeliveryError::new(handle, format!("write caption: {}", e)))?;

        tracing::info!(
            destination = %handle.destination,
            kind = kind.as_str(),
            bytes = size,
            "delivered {}",
            target.display()
        );
        Ok(())
    }

    async fn publish_status(&self, handle: &StatusHandle, text: &str) -> Result<(), DeliveryError> {
        let dir = self.destination_dir(handle).await?;
        let path = dir.join("status.log");
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DeliveryError::new(handle, format!("open {}: {}", path.display(), e)))?;
        let line = format!("[{}] {}\n", handle.status_id, text.replace('\n', " / "));
        f.write_all(line.as_bytes())
            .await
            .map_err(|e| DeliveryError::new(handle, format!("append status: {}", e)))?;
        tracing::debug!(destination = %handle.destination, status_id = handle.status_id, "{}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliver_copies_file_and_caption() {
        let root = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("clip.mp4");
        std::fs::write(&src, b"0123456789").unwrap();

        let inbox = InboxDelivery::new(root.path());
        let handle = StatusHandle::new("42", 7);
        inbox
            .deliver(&handle, &src, MediaKind::Video, "Item 1/1")
            .await
            .unwrap();

        let dir = root.path().join("42");
        assert_eq!(std::fs::read(dir.join("0001_clip.mp4")).unwrap(), b"0123456789");
        assert_eq!(
            std::fs::read_to_string(dir.join("0001_clip.mp4.txt")).unwrap(),
            "Item 1/1"
        );
    }

    #[tokio::test]
    async fn deliver_rejects_files_over_limit() {
        let root = tempfile::tempdir().unwrap();
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), vec![0u8; 11]).unwrap();

        let inbox = InboxDelivery::new(root.path()).with_max_file_bytes(10);
        let err = inbox
            .deliver(&StatusHandle::new("a", 1), src.path(), MediaKind::Image, "")
            .await
            .unwrap_err();
        assert!(err.detail.contains("too large"));
    }

    #[tokio::test]
    async fn status_lines_are_appended() {
        let root = tempfile::tempdir().unwrap();
        let inbox = InboxDelivery::new(root.path());
        let handle = StatusHandle::new("user/../x", 3);
        inbox.publish_status(&handle, "first").await.unwrap();
        inbox.publish_status(&handle, "two\nlines").await.unwrap();

        let log = std::fs::read_to_string(root.path().join("user_.._x").join("status.log")).unwrap();
        assert_eq!(log, "[3] first\n[3] two / lines\n");
    }
}
