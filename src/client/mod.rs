//! A connected chat participant and the connection capability it consumes.

pub mod client;

pub use client::{Client, Connector};

#[cfg(test)]
mod tests;
