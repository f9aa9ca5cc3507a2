//! `reelq cancel <user>` – stop a user's running download at its next checkpoint.

use anyhow::Result;

use crate::cli::control_socket::{self, Request};

pub async fn run_cancel(user: i64) -> Result<()> {
    control_socket::request_and_print(Request::Cancel { user }).await
}
