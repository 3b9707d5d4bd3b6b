//! The broker: per-topic fan-out loops and the registry that keys them.

pub mod message;
pub mod registry;
pub mod topic;

pub use message::Message;
pub use registry::Registry;
pub use topic::{Subscription, Topic, TopicHandle};
