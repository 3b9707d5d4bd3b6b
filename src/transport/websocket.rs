//! WebSocket server and connector.
//!
//! Accepts TCP connections, upgrades them on the single chat route
//! (`/chat/{key}`, anything else is refused with a 404 during the
//! handshake), and wires each connection into a [`Client`]: look the topic
//! up in the registry, build a backupper over the shared store, hand the
//! socket to a [`WsConnector`] and let the client run.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;

use crate::backup::Backupper;
use crate::broker::Registry;
use crate::client::{Client, Connector};
use crate::config::Settings;
use crate::persistence::SledStore;
use crate::transport::message::ChatMessage;
use crate::utils::error::ConnectionError;

const CHAT_ROUTE: &str = "/chat/";

/// Buffers between the socket pumps and the client's relay loops.
const READ_BUFFER: usize = 16;
const WRITE_BUFFER: usize = 16;

/// Extract the topic key from a request path. `None` means 404.
pub(crate) fn route_key(path: &str) -> Option<&str> {
    let key = path.strip_prefix(CHAT_ROUTE)?.trim_end_matches('/');
    if key.is_empty() || key.contains('/') {
        None
    } else {
        Some(key)
    }
}

/// Bind `addr` and serve chat connections until the process exits.
pub async fn start_websocket_server(
    addr: &str,
    registry: Arc<Registry>,
    store: Arc<SledStore>,
    settings: Settings,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("chat server listening on ws://{addr}");
    serve(listener, registry, store, settings).await;
    Ok(())
}

/// Accept-loop over an already bound listener. Split out so tests can bind
/// an ephemeral port themselves.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    store: Arc<SledStore>,
    settings: Settings,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept failed: {e}");
                continue;
            }
        };
        debug!(%peer, "inbound connection");

        let registry = registry.clone();
        let store = store.clone();
        let settings = settings.clone();
        tokio::spawn(handle_connection(stream, registry, store, settings));
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    store: Arc<SledStore>,
    settings: Settings,
) {
    let mut key = None;
    let callback = |req: &Request, resp: Response| match route_key(req.uri().path()) {
        Some(k) => {
            key = Some(k.to_string());
            Ok(resp)
        }
        None => {
            let mut refused = ErrorResponse::new(None);
            *refused.status_mut() = StatusCode::NOT_FOUND;
            Err(refused)
        }
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("handshake rejected: {e}");
            return;
        }
    };
    let Some(key) = key else { return };

    let conn = WsConnector::new(ws);
    registry.lookup(&key, |_found, topic| {
        let interval = Duration::from_secs(settings.chat.backup_interval_secs);
        let (backupper, backup) = Backupper::new(topic.key(), store, interval);
        let client = Client::new(
            topic,
            conn,
            backupper,
            backup,
            settings.chat.subscriber_buffer,
        );
        info!(%key, id = %client.id, "client joined");
        tokio::spawn(client.run());
    });
}

/// Channel-halves adapter over one upgraded websocket.
///
/// The read pump decodes and stamps inbound text frames; the write pump
/// turns broadcast payloads back into text frames. Either pump exiting
/// drops its half of the socket, which ends the other side too.
pub struct WsConnector {
    ws: WebSocketStream<TcpStream>,
}

impl WsConnector {
    pub fn new(ws: WebSocketStream<TcpStream>) -> Self {
        Self { ws }
    }
}

impl Connector for WsConnector {
    fn open(self) -> (mpsc::Receiver<ChatMessage>, mpsc::Sender<Bytes>) {
        let (sink, source) = self.ws.split();
        let (read_tx, read_rx) = mpsc::channel(READ_BUFFER);
        let (write_tx, write_rx) = mpsc::channel::<Bytes>(WRITE_BUFFER);

        tokio::spawn(async move {
            if let Err(e) = read_pump(source, read_tx).await {
                debug!("read loop ended: {e}");
            }
            // dropping read_tx closes the inbound sequence
        });
        tokio::spawn(async move {
            if let Err(e) = write_pump(sink, write_rx).await {
                debug!("write loop ended: {e}");
            }
        });

        (read_rx, write_tx)
    }
}

/// Socket -> channel. A transport error, a close frame or an undecodable
/// frame ends the inbound sequence.
async fn read_pump(
    mut source: SplitStream<WebSocketStream<TcpStream>>,
    read_tx: mpsc::Sender<ChatMessage>,
) -> Result<(), ConnectionError> {
    while let Some(frame) = source.next().await {
        let frame = frame?;
        if frame.is_close() {
            return Err(ConnectionError::Closed);
        }
        if !frame.is_text() {
            continue;
        }
        let Ok(text) = frame.to_text() else { continue };
        let mut msg: ChatMessage = serde_json::from_str(text)?;
        msg.stamp();
        if read_tx.send(msg).await.is_err() {
            // client side is gone
            break;
        }
    }
    Ok(())
}

/// Channel -> socket. Payloads are JSON the inbound edge encoded; a write
/// failure terminates the loop.
async fn write_pump(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut write_rx: mpsc::Receiver<Bytes>,
) -> Result<(), ConnectionError> {
    while let Some(payload) = write_rx.recv().await {
        let Ok(text) = String::from_utf8(payload.to_vec()) else {
            continue;
        };
        sink.send(WsMessage::text(text)).await?;
    }
    let _ = sink.send(WsMessage::Close(None)).await;
    Ok(())
}
