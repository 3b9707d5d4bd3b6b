//! Sled-backed message store.
//!
//! One sled tree per topic key. Entry keys are 8-byte big-endian timestamps
//! (unix seconds), bumped forward past the tree's last key whenever a
//! message's own timestamp would collide with or precede it, so keys stay
//! strictly increasing and iteration order is arrival order. Values are the
//! JSON-encoded wire message.

use sled::Db;

use crate::persistence::MessageRepo;
use crate::transport::message::ChatMessage;
use crate::utils::error::StorageError;

pub struct SledStore {
    db: Db,
    max_messages_per_topic: Option<usize>,
}

impl SledStore {
    /// Open or create the database at `path`. When
    /// `max_messages_per_topic` is set, the oldest entries of a topic are
    /// trimmed once a put pushes it past the cap.
    pub fn open(path: &str, max_messages_per_topic: Option<usize>) -> Result<Self, StorageError> {
        Ok(Self {
            db: sled::open(path)?,
            max_messages_per_topic,
        })
    }
}

impl MessageRepo for SledStore {
    fn put(&self, key: &str, msgs: &[ChatMessage]) -> Result<(), StorageError> {
        if msgs.is_empty() {
            return Ok(());
        }

        let tree = self.db.open_tree(key)?;
        let mut next = match tree.last()? {
            Some((k, _)) => decode_key(&k).map(|ts| ts + 1).unwrap_or(0),
            None => 0,
        };

        for msg in msgs {
            let ts = msg.timestamp.max(next);
            tree.insert(ts.to_be_bytes(), serde_json::to_vec(msg)?)?;
            next = ts + 1;
        }

        if let Some(max) = self.max_messages_per_topic {
            let len = tree.len();
            if len > max {
                let stale: Vec<_> = tree
                    .iter()
                    .keys()
                    .take(len - max)
                    .filter_map(Result::ok)
                    .collect();
                for k in stale {
                    tree.remove(k)?;
                }
            }
        }

        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Vec<ChatMessage>, StorageError> {
        self.fetch_x(key, usize::MAX)
    }

    fn fetch_x(&self, key: &str, limit: usize) -> Result<Vec<ChatMessage>, StorageError> {
        let tree = self.db.open_tree(key)?;

        let mut out = Vec::new();
        for entry in tree.iter().take(limit) {
            let (_, val) = entry?;
            out.push(serde_json::from_slice(&val)?);
        }

        Ok(out)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.db.drop_tree(key)?;
        Ok(())
    }
}

fn decode_key(key: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(i64::from_be_bytes(bytes))
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("max_messages_per_topic", &self.max_messages_per_topic)
            .finish()
    }
}
