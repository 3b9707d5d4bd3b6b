//! Error types shared across the crate.
//!
//! The taxonomy is deliberately small:
//! - [`ConnectionError`] covers transport failures on a single connection and
//!   is always handled locally by tearing that client down.
//! - [`GenerationError`] covers entropy/seeding failures in the id generator
//!   and is fatal to whatever operation asked for an id.
//! - [`StorageError`] covers persistence failures; the backupper logs these
//!   and retries on its next interval.
//!
//! Absence of a registry entry is never an error; those APIs speak in
//! booleans and `Option`s.

use thiserror::Error;

/// Transport-level failure on one client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}

/// Failure to produce a new identifier.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed reading random bytes: {0}")]
    Entropy(#[from] rand::Error),
}

/// Failure in the persistent message store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("failed to encode stored message: {0}")]
    Encode(#[from] serde_json::Error),
}
