use serde::Deserialize;

/// Top-level configuration for the chat server.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub chat: ChatSettings,
    pub storage: StorageSettings,
}

/// Where the server binds.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Knobs for the fan-out and backup paths.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatSettings {
    /// Capacity of each subscriber's outbox; overflow disconnects the
    /// subscriber.
    pub subscriber_buffer: usize,
    /// Seconds between periodic backup flushes.
    pub backup_interval_secs: u64,
    /// Minimum length of generated topic keys.
    pub id_min_length: usize,
}

/// Message store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub path: String,
    /// Oldest entries of a topic are trimmed past this cap.
    pub max_messages_per_topic: Option<usize>,
}

/// Partially specified settings, as loaded from a file or the environment.
/// Missing values fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub chat: Option<PartialChatSettings>,
    pub storage: Option<PartialStorageSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialChatSettings {
    pub subscriber_buffer: Option<usize>,
    pub backup_interval_secs: Option<u64>,
    pub id_min_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub max_messages_per_topic: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            chat: ChatSettings {
                subscriber_buffer: 256,
                backup_interval_secs: 30,
                id_min_length: 14,
            },
            storage: StorageSettings {
                path: "chat_db".to_string(),
                max_messages_per_topic: Some(1000),
            },
        }
    }
}
