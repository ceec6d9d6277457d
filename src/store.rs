//! Flat-file persistence for subscribers and sent article URLs.
//!
//! Two newline-delimited UTF-8 files live under the data directory:
//! `subscribers.txt` (one chat id per line) and `sent_urls.txt` (one article
//! URL per line). Both are append-only and never pruned. A missing file is
//! an empty set, not an error.
//!
//! All access is serialized through a single owning task: the scheduler and
//! the command listener each hold a cheap [`StoreHandle`] clone and talk to
//! the task over an mpsc channel, so the two activities can never interleave
//! a read-check-then-append on the same file. The task keeps both sets in
//! memory and only touches disk on mutation.
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// File name of the subscriber store, one chat id per line.
pub const SUBSCRIBERS_FILE: &str = "subscribers.txt";
/// File name of the sent-URL store, one article URL per line.
pub const SENT_URLS_FILE: &str = "sent_urls.txt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The owning task has stopped (channel closed). Only reachable during
    /// shutdown.
    #[error("Store task is no longer running")]
    Closed,
}

enum Command {
    Subscribers(oneshot::Sender<HashSet<String>>),
    AddSubscriber {
        id: String,
        reply: oneshot::Sender<Result<bool, StoreError>>,
    },
    SentUrls(oneshot::Sender<HashSet<String>>),
    RecordSent {
        urls: Vec<String>,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
}

/// Client half of the store task. Cloneable; all clones talk to the same
/// owning task.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Command>,
}

impl StoreHandle {
    /// Current set of subscriber chat ids.
    pub async fn subscribers(&self) -> Result<HashSet<String>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Subscribers(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// Register a subscriber. Returns `true` if the id was newly added,
    /// `false` if it was already present (no duplicate line is written).
    pub async fn add_subscriber(&self, id: &str) -> Result<bool, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::AddSubscriber {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Current set of article URLs that have appeared in any past digest.
    pub async fn sent_urls(&self) -> Result<HashSet<String>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SentUrls(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// Append the given URLs to the sent store. The caller guarantees the
    /// batch contains no URL already recorded (the composer filters against
    /// [`StoreHandle::sent_urls`] before selecting).
    pub async fn record_sent(&self, urls: Vec<String>) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::RecordSent { urls, reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }
}

/// Load both stores from `data_dir` and spawn the owning task.
///
/// # Errors
///
/// Fails only if an existing store file cannot be read; missing files are
/// treated as empty sets.
pub fn spawn(data_dir: &Path) -> Result<StoreHandle, StoreError> {
    let subscribers_path = data_dir.join(SUBSCRIBERS_FILE);
    let sent_urls_path = data_dir.join(SENT_URLS_FILE);

    let mut inner = Inner {
        subscribers: load_lines(&subscribers_path)?,
        sent_urls: load_lines(&sent_urls_path)?,
        subscribers_path,
        sent_urls_path,
    };

    tracing::info!(
        subscribers = inner.subscribers.len(),
        sent_urls = inner.sent_urls.len(),
        data_dir = %data_dir.display(),
        "Store loaded"
    );

    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            inner.handle(cmd);
        }
        tracing::debug!("Store task shutting down (all handles dropped)");
    });

    Ok(StoreHandle { tx })
}

struct Inner {
    subscribers: HashSet<String>,
    sent_urls: HashSet<String>,
    subscribers_path: PathBuf,
    sent_urls_path: PathBuf,
}

impl Inner {
    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribers(reply) => {
                let _ = reply.send(self.subscribers.clone());
            }
            Command::AddSubscriber { id, reply } => {
                let _ = reply.send(self.add_subscriber(id));
            }
            Command::SentUrls(reply) => {
                let _ = reply.send(self.sent_urls.clone());
            }
            Command::RecordSent { urls, reply } => {
                let _ = reply.send(self.record_sent(urls));
            }
        }
    }

    fn add_subscriber(&mut self, id: String) -> Result<bool, StoreError> {
        if self.subscribers.contains(&id) {
            tracing::debug!(chat_id = %id, "Subscriber already registered");
            return Ok(false);
        }
        append_lines(&self.subscribers_path, std::slice::from_ref(&id))?;
        tracing::info!(chat_id = %id, total = self.subscribers.len() + 1, "New subscriber");
        self.subscribers.insert(id);
        Ok(true)
    }

    fn record_sent(&mut self, urls: Vec<String>) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }
        append_lines(&self.sent_urls_path, &urls)?;
        let count = urls.len();
        for url in urls {
            self.sent_urls.insert(url);
        }
        tracing::debug!(appended = count, total = self.sent_urls.len(), "Sent URLs recorded");
        Ok(())
    }
}

/// Read a newline-delimited file into a set. Missing file → empty set.
/// Blank lines (e.g. a trailing newline) are skipped.
fn load_lines(path: &Path) -> Result<HashSet<String>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(StoreError::Io(e)),
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn append_lines(path: &Path, lines: &[String]) -> Result<(), StoreError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes())?;
    Ok(())
}
