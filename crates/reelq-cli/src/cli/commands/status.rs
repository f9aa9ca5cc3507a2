//! `reelq status` – worker and queue occupancy of the running service.

use anyhow::Result;

use crate::cli::control_socket::{self, Request};

pub async fn run_status() -> Result<()> {
    control_socket::request_and_print(Request::Status).await
}
