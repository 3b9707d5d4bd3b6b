use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{Client, Connector};
use crate::backup::Backupper;
use crate::broker::topic::TopicHandle;
use crate::broker::Topic;
use crate::persistence::MessageRepo;
use crate::transport::message::ChatMessage;
use crate::utils::error::StorageError;

/// A connection made of bare channels: the test feeds inbound messages and
/// observes outbound frames.
struct FakeConnector {
    read_rx: mpsc::Receiver<ChatMessage>,
    write_tx: mpsc::Sender<Bytes>,
}

impl Connector for FakeConnector {
    fn open(self) -> (mpsc::Receiver<ChatMessage>, mpsc::Sender<Bytes>) {
        (self.read_rx, self.write_tx)
    }
}

#[derive(Default)]
struct RecordingRepo {
    puts: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl MessageRepo for RecordingRepo {
    fn put(&self, key: &str, msgs: &[ChatMessage]) -> Result<(), StorageError> {
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), msgs.to_vec()));
        Ok(())
    }

    fn fetch(&self, _key: &str) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(Vec::new())
    }

    fn fetch_x(&self, _key: &str, _limit: usize) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(Vec::new())
    }

    fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

fn chat(body: &str, sender: i64) -> ChatMessage {
    ChatMessage {
        timestamp: 1_600_000_000,
        sent: "09/13/20 12:26 pm".to_string(),
        body: body.to_string(),
        sender_id: sender,
    }
}

fn spawn_client(
    topic: TopicHandle,
    repo: Arc<RecordingRepo>,
) -> (mpsc::Sender<ChatMessage>, mpsc::Receiver<Bytes>, JoinHandle<()>) {
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, out_rx) = mpsc::channel(8);
    let conn = FakeConnector {
        read_rx: in_rx,
        write_tx: out_tx,
    };
    let (backupper, backup) = Backupper::new(topic.key(), repo, Duration::from_secs(600));
    let client = Client::new(topic, conn, backupper, backup, 8);
    let task = tokio::spawn(client.run());
    (in_tx, out_rx, task)
}

fn decode(frame: &Bytes) -> ChatMessage {
    serde_json::from_slice(frame).unwrap()
}

#[tokio::test]
async fn messages_relay_between_clients_in_a_room() {
    let (topic, handle) = Topic::new("room");
    tokio::spawn(topic.run());
    let repo = Arc::new(RecordingRepo::default());

    let (a_in, mut a_out, a_task) = spawn_client(handle.clone(), repo.clone());
    let (b_in, mut b_out, b_task) = spawn_client(handle.clone(), repo.clone());
    // give both clients time to register before the first broadcast
    tokio::time::sleep(Duration::from_millis(100)).await;

    a_in.send(chat("hello room", 1)).await.unwrap();

    let frame = timeout(Duration::from_secs(1), b_out.recv())
        .await
        .expect("no relay to the other client")
        .unwrap();
    let relayed = decode(&frame);
    assert_eq!(relayed.body, "hello room");
    assert_eq!(relayed.sender_id, 1);

    // the sender is a subscriber like any other and hears itself
    let echo = timeout(Duration::from_secs(1), a_out.recv())
        .await
        .expect("no echo to the sender")
        .unwrap();
    assert_eq!(decode(&echo).body, "hello room");

    drop(a_in);
    drop(b_in);
    a_task.await.unwrap();
    b_task.await.unwrap();
}

#[tokio::test]
async fn delivered_messages_are_backed_up_on_teardown() {
    let (topic, handle) = Topic::new("room");
    tokio::spawn(topic.run());
    let repo = Arc::new(RecordingRepo::default());

    let (a_in, mut a_out, a_task) = spawn_client(handle.clone(), repo.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;

    a_in.send(chat("one", 1)).await.unwrap();
    a_in.send(chat("two", 1)).await.unwrap();

    // wait for both echoes so we know the messages went through the topic
    for _ in 0..2 {
        timeout(Duration::from_secs(1), a_out.recv())
            .await
            .expect("echo missing")
            .unwrap();
    }

    // closing the connection unregisters the client, which closes its
    // receive channel, cancels the backupper and triggers the final flush
    drop(a_in);
    a_task.await.unwrap();

    let puts = repo.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, "room");
    let bodies: Vec<_> = puts[0].1.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["one", "two"]);
}

#[tokio::test]
async fn last_client_leaving_terminates_the_topic() {
    let (topic, handle) = Topic::new("room");
    let loop_task = tokio::spawn(topic.run());
    let repo = Arc::new(RecordingRepo::default());

    let (a_in, _a_out, a_task) = spawn_client(handle.clone(), repo.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(a_in);
    a_task.await.unwrap();

    timeout(Duration::from_secs(1), loop_task)
        .await
        .expect("topic loop did not terminate")
        .unwrap();
    assert!(handle.is_terminated());
}
