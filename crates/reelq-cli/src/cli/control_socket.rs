//! Control socket: server (during `reelq serve`) and client (for the other commands).
//! Protocol: one request line, one reply line. Requests are `submit <user> <text>`,
//! `cancel <user>`, `queue <user>` and `status`.

use anyhow::{bail, Context, Result};
use reelq_core::delivery::StatusHandle;
use reelq_core::scheduler::{status, QueuePosition, Scheduler, SchedulerSnapshot, UserId};
use reelq_core::url_model::extract_reference;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Submit { user: UserId, text: String },
    Cancel { user: UserId },
    Queue { user: UserId },
    Status,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let user = |s: &str| -> Result<UserId> {
            s.parse::<UserId>()
                .with_context(|| format!("invalid user id `{}`", s))
        };
        match verb {
            "submit" => {
                let (id, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let text = text.trim();
                if text.is_empty() {
                    bail!("submit needs a user id and a message");
                }
                Ok(Request::Submit {
                    user: user(id)?,
                    text: text.to_string(),
                })
            }
            "cancel" => Ok(Request::Cancel { user: user(rest)? }),
            "queue" => Ok(Request::Queue { user: user(rest)? }),
            "status" if rest.is_empty() => Ok(Request::Status),
            "status" => bail!("status takes no arguments"),
            "" => bail!("empty request"),
            other => bail!("unknown request `{}`", other),
        }
    }

    /// Wire form, without the trailing newline. Newlines in text become spaces.
    pub fn to_line(&self) -> String {
        match self {
            Request::Submit { user, text } => format!("submit {} {}", user, text.replace('\n', " ")),
            Request::Cancel { user } => format!("cancel {}", user),
            Request::Queue { user } => format!("queue {}", user),
            Request::Status => "status".to_string(),
        }
    }
}

/// What the listener needs to answer requests.
pub struct ControlState {
    scheduler: Scheduler,
    next_status: AtomicU64,
}

impl ControlState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            next_status: AtomicU64::new(0),
        }
    }

    /// Answer one request with one line of text.
    pub fn handle(&self, request: Request) -> String {
        let sched = &self.scheduler;
        match request {
            Request::Submit { user, text } => {
                let Some(reference) = extract_reference(&text) else {
                    return "error: no supported link found in message".to_string();
                };
                let status_id = self.next_status.fetch_add(1, Ordering::Relaxed) + 1;
                let handle = StatusHandle::new(user.to_string(), status_id);
                match sched.submit(user, reference, handle) {
                    Ok(ticket) => status::admitted(ticket.admission),
                    Err(e) => status::rejected(e),
                }
            }
            Request::Cancel { user } => {
                if sched.cancel(user) {
                    return "Cancellation requested.".to_string();
                }
                match sched.position_of(user) {
                    QueuePosition::QueuedAt(_) => {
                        "Your download is still waiting in the queue and cannot be cancelled."
                            .to_string()
                    }
                    _ => "You have no download in progress.".to_string(),
                }
            }
            Request::Queue { user } => describe_position(sched.position_of(user)),
            Request::Status => describe_snapshot(&sched.snapshot()),
        }
    }
}

pub fn describe_position(position: QueuePosition) -> String {
    match position {
        QueuePosition::InProgress => "Your download is in progress.".to_string(),
        QueuePosition::QueuedAt(n) => format!("You are #{} in the waiting queue.", n),
        QueuePosition::NotFound => "You have no download in progress or queued.".to_string(),
    }
}

pub fn describe_snapshot(s: &SchedulerSnapshot) -> String {
    format!(
        "workers busy {}/{}, queued {}/{}",
        s.active, s.workers, s.queued, s.queue_capacity
    )
}

/// Spawns a task that listens on `path` and answers each request line.
/// Malformed lines get an `error: ...` reply.
pub fn spawn_control_listener(
    state: Arc<ControlState>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("control socket bind {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&state, stream).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(state: &ControlState, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match Request::parse(&line) {
            Ok(request) => state.handle(request),
            Err(e) => format!("error: {:#}", e),
        };
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

/// Sends one request and returns the reply line.
pub async fn send_request(socket_path: &Path, request: &Request) -> Result<String> {
    if !socket_path.exists() {
        bail!(
            "reelq is not running (no control socket at {})",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{}\n", request.to_line()).as_bytes())
        .await?;
    let mut lines = BufReader::new(read).lines();
    match lines.next_line().await? {
        Some(reply) => Ok(reply),
        None => bail!("service closed the connection without replying"),
    }
}

/// Client helper for the one-shot commands: send to the default socket and print the reply.
pub async fn request_and_print(request: Request) -> Result<()> {
    let path = reelq_core::control::default_control_socket_path()?;
    let reply = send_request(&path, &request).await?;
    println!("{}", reply);
    Ok(())
}
