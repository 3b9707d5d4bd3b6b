//! Orchestration glue for one connection.
//!
//! A [`Client`] binds a [`Connector`] to a topic and a backupper and runs
//! three concurrent loops: the backupper's own run loop, an inbound relay
//! (connection -> broadcast + hold), and an outbound relay (receive channel ->
//! connection). The inbound relay unregisters from the topic when the
//! connection ends; the outbound relay cancels the backupper when the topic
//! closes this subscriber's channel.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backup::{BackupHandle, Backupper};
use crate::broker::topic::{SubscriberId, Subscription, TopicHandle};
use crate::broker::Message;
use crate::persistence::MessageRepo;
use crate::transport::message::ChatMessage;

/// A bidirectional message stream for one connection.
///
/// `open` hands back the connection's channel halves: inbound frames arrive
/// already decoded on the receiver, which closes when the connection ends;
/// the sender accepts encoded frames for the peer, and a closed sender means
/// the connection is gone. Transport errors stay inside the implementation;
/// they surface here only as closed channels.
pub trait Connector {
    fn open(self) -> (mpsc::Receiver<ChatMessage>, mpsc::Sender<Bytes>);
}

pub struct Client<C, R>
where
    C: Connector,
    R: MessageRepo + 'static,
{
    pub id: SubscriberId,
    topic: TopicHandle,
    conn: C,
    backupper: Backupper<R>,
    backup: BackupHandle,
    outbox_buffer: usize,
}

impl<C, R> Client<C, R>
where
    C: Connector,
    R: MessageRepo + 'static,
{
    pub fn new(
        topic: TopicHandle,
        conn: C,
        backupper: Backupper<R>,
        backup: BackupHandle,
        outbox_buffer: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic,
            conn,
            backupper,
            backup,
            outbox_buffer,
        }
    }

    /// Relay until the connection ends, then tear everything down. Returns
    /// once the outbound relay and the backupper's final flush are done.
    pub async fn run(self) {
        let Client {
            id,
            topic,
            conn,
            backupper,
            backup,
            outbox_buffer,
        } = self;

        let (read_rx, write_tx) = conn.open();
        let (outbox_tx, outbox_rx) = mpsc::channel(outbox_buffer);

        if topic
            .register(Subscription {
                id: id.clone(),
                outbox: outbox_tx,
            })
            .await
            .is_err()
        {
            warn!(%id, "topic terminated before registration");
            return;
        }

        let shutdown = CancellationToken::new();
        let backup_task = tokio::spawn(backupper.run(shutdown.clone()));
        let outbound_task = tokio::spawn(relay_outbound(outbox_rx, write_tx, shutdown));

        relay_inbound(read_rx, &topic, &backup).await;

        // connection is gone; leave the room (a no-op if we were evicted)
        if topic.unregister(id.clone()).await.is_err() {
            debug!(%id, "topic already terminated on unregister");
        }

        let _ = outbound_task.await;
        let _ = backup_task.await;
        debug!(%id, "client torn down");
    }
}

/// Consume inbound messages until the connection closes, fanning each one
/// out through the topic and handing it to the backupper.
async fn relay_inbound(
    mut read_rx: mpsc::Receiver<ChatMessage>,
    topic: &TopicHandle,
    backup: &BackupHandle,
) {
    while let Some(msg) = read_rx.recv().await {
        let payload = match serde_json::to_vec(&msg) {
            Ok(encoded) => Bytes::from(encoded),
            Err(e) => {
                warn!(error = %e, "dropping unencodable message");
                continue;
            }
        };
        let sent = DateTime::from_timestamp(msg.timestamp, 0).unwrap_or_else(Utc::now);

        if topic.broadcast(Message::new(sent, payload)).await.is_err() {
            warn!(key = %topic.key(), "topic terminated mid-broadcast");
            break;
        }
        backup.hold(msg);
    }
}

/// Forward broadcast payloads to the connection until the topic closes this
/// subscriber's channel, then cancel the backupper so it drains and exits.
async fn relay_outbound(
    mut outbox_rx: mpsc::Receiver<Message>,
    write_tx: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
) {
    while let Some(msg) = outbox_rx.recv().await {
        if write_tx.send(msg.payload).await.is_err() {
            // write side of the connection is gone
            break;
        }
    }
    shutdown.cancel();
}
