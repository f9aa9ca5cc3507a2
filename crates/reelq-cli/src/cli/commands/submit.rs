//! `reelq submit <user> <text...>` – hand a message to the running service.

use anyhow::{bail, Result};
use reelq_core::url_model::extract_reference;

use crate::cli::control_socket::{self, Request};

pub async fn run_submit(user: i64, text: &str) -> Result<()> {
    // Catch obvious mistakes before touching the socket.
    if extract_reference(text).is_none() {
        bail!("no supported link found in: {}", text);
    }
    control_socket::request_and_print(Request::Submit {
        user,
        text: text.to_string(),
    })
    .await
}
