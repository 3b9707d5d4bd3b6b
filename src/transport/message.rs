use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Display format for the human-readable send time, e.g. "01/02/06  3:04 pm".
const SENT_FORMAT: &str = "%m/%d/%y %l:%M %P";

/// The wire representation of one chat message.
///
/// This exact JSON shape travels over the websocket and into the message
/// store: `{"timestamp": ..., "sent": "...", "body": "...", "senderID": ...}`.
/// `timestamp` is unix seconds; `sent` is a formatted clock string for
/// display. Senders may omit both, in which case the server stamps them at
/// ingress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub sent: String,
    pub body: String,
    #[serde(rename = "senderID", default)]
    pub sender_id: i64,
}

impl ChatMessage {
    /// Fill in the send-time fields the sender left empty.
    pub fn stamp(&mut self) {
        let now = Utc::now();
        if self.timestamp == 0 {
            self.timestamp = now.timestamp();
        }
        if self.sent.is_empty() {
            self.sent = now.format(SENT_FORMAT).to_string();
        }
    }
}
