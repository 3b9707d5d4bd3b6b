//! Topic registry.
//!
//! Maps topic keys to live [`TopicHandle`]s behind a single mutex, holding
//! the lock only for the duration of one lookup, insert or removal. The
//! registry guarantees at most one live topic per key: it spawns each
//! topic's loop itself and removes the map entry when that loop ends, so a
//! topic that decided to die can never linger as a reachable entry, and a
//! replacement topic created under the same key is never clobbered by the
//! old loop's cleanup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::broker::topic::{Topic, TopicHandle};
use crate::id::Generator;
use crate::utils::error::GenerationError;

pub struct Registry {
    topics: Mutex<HashMap<String, TopicHandle>>,
    idgen: Generator,
}

impl Registry {
    pub fn new(idgen: Generator) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            idgen,
        }
    }

    /// Find the live topic for `key`, creating and starting one if absent.
    ///
    /// The callback always fires, after the lock is released: with
    /// `found = true` and the existing handle, or `found = false` and a
    /// freshly started topic. Under arbitrary concurrent calls with the same
    /// key exactly one caller observes `found = false`, and every caller
    /// receives the same topic instance.
    ///
    /// An entry whose loop has already exited counts as absent and is
    /// replaced. Must be called from within a tokio runtime, since a miss
    /// spawns the new topic's loop.
    pub fn lookup<F>(self: &Arc<Self>, key: &str, cb: F)
    where
        F: FnOnce(bool, TopicHandle),
    {
        let (found, handle) = {
            let mut topics = self.topics.lock().unwrap();
            match topics.get(key) {
                Some(handle) if !handle.is_terminated() => (true, handle.clone()),
                _ => {
                    let (topic, handle) = Topic::new(key);
                    topics.insert(key.to_string(), handle.clone());
                    self.spawn_topic(topic, &handle);
                    (false, handle)
                }
            }
        };

        if !found {
            info!(key, "started topic");
        }
        cb(found, handle);
    }

    /// Create a topic under a freshly generated key, for callers that want
    /// server-assigned room ids. Fails only if the id generator does.
    pub fn new_topic(self: &Arc<Self>) -> Result<TopicHandle, GenerationError> {
        let key = self.idgen.new_id()?;
        let (topic, handle) = Topic::new(&key);

        self.topics
            .lock()
            .unwrap()
            .insert(key.clone(), handle.clone());
        self.spawn_topic(topic, &handle);

        info!(%key, "started topic");
        Ok(handle)
    }

    /// Remove the entry for `key`, returning whether it was present.
    /// Idempotent under concurrent invocation.
    pub fn remove(&self, key: &str) -> bool {
        self.topics.lock().unwrap().remove(key).is_some()
    }

    /// The handle for `key`, if one is registered. No side effects.
    pub fn exists(&self, key: &str) -> Option<TopicHandle> {
        self.topics.lock().unwrap().get(key).cloned()
    }

    pub fn size(&self) -> usize {
        self.topics.lock().unwrap().len()
    }

    /// Run the topic's loop and clean up its entry once the loop exits.
    /// Removal compares channel identity so it only ever deletes the
    /// instance that terminated.
    fn spawn_topic(self: &Arc<Self>, topic: Topic, handle: &TopicHandle) {
        let registry = Arc::clone(self);
        let key = topic.key().to_string();
        let handle = handle.clone();

        tokio::spawn(async move {
            topic.run().await;
            registry.remove_terminated(&key, &handle);
        });
    }

    fn remove_terminated(&self, key: &str, handle: &TopicHandle) {
        let mut topics = self.topics.lock().unwrap();
        if let Some(current) = topics.get(key) {
            if current.same_topic(handle) {
                topics.remove(key);
                debug!(key, "removed terminated topic");
            }
        }
    }
}
