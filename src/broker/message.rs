use bytes::Bytes;
use chrono::{DateTime, Utc};

/// The unit passed through a topic's broadcast channel.
///
/// The payload is opaque to the fan-out path: the transport edge encodes the
/// wire message once at ingress and every subscriber receives the same
/// refcounted bytes. `sent` is the sender's claimed send time, `received` the
/// moment the server accepted the message.
#[derive(Debug, Clone)]
pub struct Message {
    pub received: DateTime<Utc>,
    pub sent: DateTime<Utc>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(sent: DateTime<Utc>, payload: Bytes) -> Self {
        Self {
            received: Utc::now(),
            sent,
            payload,
        }
    }
}
