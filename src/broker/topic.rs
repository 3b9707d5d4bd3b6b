//! Per-topic fan-out loop.
//!
//! A [`Topic`] is a single task that exclusively owns one chat room's
//! subscriber set. All interaction goes through the channels held by its
//! [`TopicHandle`]; nothing else ever touches the set, so it needs no lock.
//!
//! Delivery is try-send only: a subscriber whose outbox is full or closed is
//! evicted in the same step, so a stalled consumer can never hold up the
//! fan-out for the rest of the room.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::broker::message::Message;

pub type SubscriberId = String;

/// Inbox sizes for the control and broadcast channels. Senders queue here
/// while the loop is busy; a full control inbox blocks the caller, which is
/// the intended register/unregister contract.
const CONTROL_BUFFER: usize = 16;
const BROADCAST_BUFFER: usize = 64;

/// Returned by [`TopicHandle`] methods once the topic's loop has exited.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("topic loop has terminated")]
pub struct TopicTerminated;

/// A subscriber's registration: its id and the sending half of its outbox.
/// The topic owns the sender from registration until unregistration or
/// eviction; dropping it is what closes the subscriber's receive channel.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub outbox: mpsc::Sender<Message>,
}

/// One chat room's fan-out state. Created with [`Topic::new`], consumed by
/// [`Topic::run`].
pub struct Topic {
    key: String,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Message>>,
    register_rx: mpsc::Receiver<Subscription>,
    unregister_rx: mpsc::Receiver<SubscriberId>,
    broadcast_rx: mpsc::Receiver<Message>,
    // set on first registration; a fresh topic must not exit on a stray
    // unregister before anyone has joined
    served: bool,
}

/// Cloneable endpoints for one topic's loop.
#[derive(Debug, Clone)]
pub struct TopicHandle {
    key: String,
    register_tx: mpsc::Sender<Subscription>,
    unregister_tx: mpsc::Sender<SubscriberId>,
    broadcast_tx: mpsc::Sender<Message>,
}

impl Topic {
    pub fn new(key: &str) -> (Self, TopicHandle) {
        let (register_tx, register_rx) = mpsc::channel(CONTROL_BUFFER);
        let (unregister_tx, unregister_rx) = mpsc::channel(CONTROL_BUFFER);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_BUFFER);

        let topic = Self {
            key: key.to_string(),
            subscribers: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            served: false,
        };
        let handle = TopicHandle {
            key: key.to_string(),
            register_tx,
            unregister_tx,
            broadcast_tx,
        };

        (topic, handle)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the topic's event loop until the subscriber set empties.
    ///
    /// Exactly one event is processed at a time. The loop exits when an
    /// unregister leaves the set empty after it has held at least one
    /// subscriber, or when every handle has been dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(sub) = self.register_rx.recv() => {
                    debug!(key = %self.key, id = %sub.id, "subscriber registered");
                    self.subscribers.insert(sub.id, sub.outbox);
                    self.served = true;
                }
                Some(id) = self.unregister_rx.recv() => {
                    // removing an unknown id is a no-op; dropping the sender
                    // closes the subscriber's receive channel
                    self.subscribers.remove(&id);
                    if self.served && self.subscribers.is_empty() {
                        break;
                    }
                }
                Some(msg) = self.broadcast_rx.recv() => {
                    self.fan_out(msg);
                }
                else => break,
            }
        }
        debug!(key = %self.key, "topic terminated");
    }

    fn fan_out(&mut self, msg: Message) {
        let key = &self.key;
        self.subscribers.retain(|id, outbox| {
            match outbox.try_send(msg.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(key = %key, id = %id, "subscriber outbox full, evicting");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(key = %key, id = %id, "subscriber outbox closed, evicting");
                    false
                }
            }
        });
    }
}

impl TopicHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Register a subscription. May block until the loop is free.
    pub async fn register(&self, sub: Subscription) -> Result<(), TopicTerminated> {
        self.register_tx.send(sub).await.map_err(|_| TopicTerminated)
    }

    /// Unregister a subscriber, closing its outbox. May block until the loop
    /// is free. Unknown ids are ignored by the loop.
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), TopicTerminated> {
        self.unregister_tx.send(id).await.map_err(|_| TopicTerminated)
    }

    /// Queue a message for fan-out. The loop never blocks on subscriber
    /// delivery; this only waits for space in the topic's own inbox.
    pub async fn broadcast(&self, msg: Message) -> Result<(), TopicTerminated> {
        self.broadcast_tx.send(msg).await.map_err(|_| TopicTerminated)
    }

    /// True once the topic's loop has exited.
    pub fn is_terminated(&self) -> bool {
        self.broadcast_tx.is_closed()
    }

    /// Whether two handles point at the same topic instance.
    pub(crate) fn same_topic(&self, other: &TopicHandle) -> bool {
        self.broadcast_tx.same_channel(&other.broadcast_tx)
    }
}
