//! Configuration loading.
//!
//! Settings come from an optional `config/default` file and the
//! environment, merged field-by-field over [`Settings::default`] so a
//! partial file is enough.

pub mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{ChatSettings, ServerSettings, Settings, StorageSettings};

pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        chat: ChatSettings {
            subscriber_buffer: partial
                .chat
                .as_ref()
                .and_then(|c| c.subscriber_buffer)
                .unwrap_or(default.chat.subscriber_buffer),
            backup_interval_secs: partial
                .chat
                .as_ref()
                .and_then(|c| c.backup_interval_secs)
                .unwrap_or(default.chat.backup_interval_secs),
            id_min_length: partial
                .chat
                .as_ref()
                .and_then(|c| c.id_min_length)
                .unwrap_or(default.chat.id_min_length),
        },
        storage: StorageSettings {
            path: partial
                .storage
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.storage.path),
            max_messages_per_topic: partial
                .storage
                .as_ref()
                .and_then(|s| s.max_messages_per_topic)
                .or(default.storage.max_messages_per_topic),
        },
    })
}
