//! Periodic message backup.
//!
//! A [`Backupper`] caches delivered messages for one backup id (the topic
//! key) and flushes the whole cache into a [`MessageRepo`] on a fixed
//! interval, plus once more on shutdown. The cache has exactly one owner:
//! other tasks hand messages over through a [`BackupHandle`], whose sends
//! land in the run loop's inbox, so holding and flushing can never race.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::persistence::MessageRepo;
use crate::transport::message::ChatMessage;
use crate::utils::error::StorageError;

pub struct Backupper<R: MessageRepo> {
    id: String,
    cache: Vec<ChatMessage>,
    store: Arc<R>,
    interval: Duration,
    hold_rx: mpsc::UnboundedReceiver<ChatMessage>,
}

/// Cross-task entry point for holding messages with a running backupper.
#[derive(Debug, Clone)]
pub struct BackupHandle {
    hold_tx: mpsc::UnboundedSender<ChatMessage>,
}

impl BackupHandle {
    /// Queue a message for the next flush. A backupper that has already
    /// terminated simply drops the message; by then its final flush is done.
    pub fn hold(&self, msg: ChatMessage) {
        let _ = self.hold_tx.send(msg);
    }
}

impl<R: MessageRepo> Backupper<R> {
    pub fn new(id: impl Into<String>, store: Arc<R>, interval: Duration) -> (Self, BackupHandle) {
        let (hold_tx, hold_rx) = mpsc::unbounded_channel();

        let backupper = Self {
            id: id.into(),
            cache: Vec::new(),
            store,
            interval,
            hold_rx,
        };

        (backupper, BackupHandle { hold_tx })
    }

    /// Append messages to the in-memory cache. Only the owner of the
    /// backupper may call this; everyone else goes through [`BackupHandle`].
    pub fn hold(&mut self, msgs: impl IntoIterator<Item = ChatMessage>) {
        self.cache.extend(msgs);
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Flush the entire cache to the store in a single put.
    ///
    /// On success the cache is emptied, retaining its capacity. On failure
    /// the cache is left intact so the messages are still pending for a
    /// later attempt. An empty cache flushes to nothing.
    pub fn backup(&mut self) -> Result<(), StorageError> {
        if self.cache.is_empty() {
            return Ok(());
        }

        self.store.put(&self.id, &self.cache)?;
        self.cache.clear();

        Ok(())
    }

    /// Drive the backupper until `shutdown` is cancelled: accept held
    /// messages, flush on every interval tick, and on cancellation drain
    /// whatever is still queued and flush one final time.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick of a tokio interval completes immediately
        ticker.tick().await;

        let mut open = true;
        loop {
            tokio::select! {
                msg = self.hold_rx.recv(), if open => match msg {
                    Some(msg) => self.hold([msg]),
                    None => open = false,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.backup() {
                        warn!(id = %self.id, error = %e, "periodic backup failed, retrying next interval");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        while let Ok(msg) = self.hold_rx.try_recv() {
            self.hold([msg]);
        }
        if let Err(e) = self.backup() {
            warn!(
                id = %self.id,
                error = %e,
                dropped = self.cache.len(),
                "final backup failed"
            );
        }
        debug!(id = %self.id, "backupper terminated");
    }
}
