//! `reelq queue <user>` – show a user's queue position.

use anyhow::Result;

use crate::cli::control_socket::{self, Request};

pub async fn run_queue(user: i64) -> Result<()> {
    control_socket::request_and_print(Request::Queue { user }).await
}
