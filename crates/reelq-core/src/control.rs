//! Job control for cancellation: per-job cancel tokens.
//!
//! Each admitted job carries a `CancelToken`. The `cancel` request sets it;
//! the executing pipeline polls it at its checkpoints and stops. Setting the
//! token never interrupts a collaborator call already in flight.
//!
//! Cancel requests reach a running service through the control socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error returned when a job is stopped by its user.
#[derive(Debug)]
pub struct JobCancelled;

impl std::fmt::Display for JobCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job cancelled by user")
    }
}

impl std::error::Error for JobCancelled {}

/// One-way cancellation flag shared between the submitter and the executor.
///
/// Clones share the same flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Returns true if this call flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Checkpoint helper: `Err(JobCancelled)` once the token is set.
    pub fn check(&self) -> Result<(), JobCancelled> {
        if self.is_cancelled() {
            Err(JobCancelled)
        } else {
            Ok(())
        }
    }
}

/// Default path for the service control socket (XDG state dir, next to the log).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("reelq")?.get_state_home();
    Ok(dir.join("control.sock"))
}
