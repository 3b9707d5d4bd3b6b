//! # Roomcast
//!
//! `roomcast` is a realtime chat relay built on tokio. Clients connect over
//! WebSocket to `/chat/{key}`; every key is one room with a single fan-out
//! task, started on first join and torn down when the last participant
//! leaves. Delivered messages are buffered per client and drained into an
//! embedded sled store in the background.
//!
//! ## Core modules
//!
//! - `broker`: per-topic fan-out loops and the registry that guarantees one
//!   live loop per key.
//! - `id`: salted generation of topic keys.
//! - `backup`: the periodic backup cache feeding the message store.
//! - `client`: glue binding one connection to a topic and a backupper.
//! - `persistence`: the `MessageRepo` capability and its sled
//!   implementation.
//! - `transport`: the WebSocket server and wire schema.
//! - `config`: file/environment configuration.
//! - `utils`: error taxonomy and logging setup.

pub mod backup;
pub mod broker;
pub mod client;
pub mod config;
pub mod id;
pub mod persistence;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
