//! CLI command handlers, one per file.

mod cancel;
mod queue;
mod serve;
mod status;
mod submit;

pub use cancel::run_cancel;
pub use queue::run_queue;
pub use serve::run_serve;
pub use status::run_status;
pub use submit::run_submit;
