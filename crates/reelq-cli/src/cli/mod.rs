//! CLI for the reelq fetch-and-deliver service.

mod commands;
pub mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reelq_core::config;

use commands::{run_cancel, run_queue, run_serve, run_status, run_submit};

/// Top-level CLI for reelq.
#[derive(Debug, Parser)]
#[command(name = "reelq")]
#[command(about = "reelq: fetch media links and deliver them through a bounded worker pool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the service: worker pool, waiting queue and control socket.
    Serve {
        /// Number of worker slots (overrides `max_workers`).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Waiting queue capacity (overrides `max_queue`).
        #[arg(long, value_name = "N")]
        queue: Option<usize>,
    },

    /// Submit a message for a user; the first supported link in it is fetched.
    Submit {
        /// User identity.
        user: i64,
        /// Message text containing the link.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Cancel a user's running download.
    Cancel {
        /// User identity.
        user: i64,
    },

    /// Show where a user's download is: running, queued, or nowhere.
    Queue {
        /// User identity.
        user: i64,
    },

    /// Show worker and queue occupancy.
    Status,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { workers, queue } => run_serve(cfg, workers, queue).await?,
            CliCommand::Submit { user, text } => run_submit(user, &text.join(" ")).await?,
            CliCommand::Cancel { user } => run_cancel(user).await?,
            CliCommand::Queue { user } => run_queue(user).await?,
            CliCommand::Status => run_status().await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
