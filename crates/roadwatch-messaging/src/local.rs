//! In-process message bus.
//!
//! Gives a single process (or a test with several replicas) the same
//! delivery semantics as NATS: a command goes to exactly one handler that
//! answers through a oneshot channel, and an event reaches every
//! subscriber.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::debug;

use crate::error::MessagingError;

/// Capacity of the command queue and the event broadcast buffer.
const CHANNEL_CAPACITY: usize = 256;

/// A command waiting for a handler.
#[derive(Debug)]
pub struct LocalCommand {
    /// Encoded command.
    pub payload: Vec<u8>,
    /// Where the encoded reply goes.
    pub reply: oneshot::Sender<Vec<u8>>,
}

/// Shared end of the command queue; handlers compete for messages.
pub type CommandReceiver = Arc<Mutex<mpsc::Receiver<LocalCommand>>>;

/// Tokio-channel bus shared by every replica in the process.
#[derive(Debug, Clone)]
pub struct LocalBus {
    commands_tx: mpsc::Sender<LocalCommand>,
    commands_rx: CommandReceiver,
    events_tx: broadcast::Sender<Vec<u8>>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            commands_tx,
            commands_rx: Arc::new(Mutex::new(commands_rx)),
            events_tx,
        }
    }

    /// Broadcast an encoded event to every current subscriber.
    ///
    /// Publishing with no subscribers is not an error; the event is simply
    /// not observed by anyone.
    pub fn publish(&self, payload: Vec<u8>) {
        match self.events_tx.send(payload) {
            Ok(receivers) => debug!(receivers, "event broadcast"),
            Err(_unobserved) => debug!("event broadcast with no subscribers"),
        }
    }

    /// Queue an encoded command and wait up to `wait` for its reply.
    ///
    /// The deadline covers waiting for room in a full queue as well as
    /// waiting for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if no handler answers in time
    /// or the handler dropped the command.
    pub async fn request(&self, payload: Vec<u8>, wait: Duration) -> Result<Vec<u8>, MessagingError> {
        let (reply, answer) = oneshot::channel();
        let exchange = async {
            self.commands_tx
                .send(LocalCommand { payload, reply })
                .await
                .map_err(|e| MessagingError::Transport(format!("command queue closed: {e}")))?;
            answer
                .await
                .map_err(|e| MessagingError::Transport(format!("handler dropped command: {e}")))
        };

        tokio::time::timeout(wait, exchange)
            .await
            .map_err(|e| MessagingError::Transport(format!("no reply within {wait:?}: {e}")))?
    }

    /// A new receiver for every event published from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Vec<u8>> {
        self.events_tx.subscribe()
    }

    /// The shared command queue.
    pub fn command_receiver(&self) -> CommandReceiver {
        Arc::clone(&self.commands_rx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = LocalBus::new();
        let mut a = bus.subscribe_events();
        let mut b = bus.subscribe_events();
        bus.publish(b"one".to_vec());
        assert_eq!(a.recv().await.unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn request_gets_handler_reply() {
        let bus = LocalBus::new();
        let rx = bus.command_receiver();
        tokio::spawn(async move {
            let cmd = rx.lock().await.recv().await.unwrap();
            let _ = cmd.reply.send(cmd.payload.into_iter().rev().collect());
        });
        let reply = bus.request(b"abc".to_vec(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply, b"cba");
    }

    #[tokio::test]
    async fn request_without_handler_times_out() {
        let bus = LocalBus::new();
        let result = bus.request(b"x".to_vec(), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(MessagingError::Transport(_))));
    }

    #[tokio::test]
    async fn request_into_full_queue_still_times_out() {
        let bus = LocalBus::new();
        let mut parked = Vec::new();
        for _ in 0..CHANNEL_CAPACITY {
            let (reply, answer) = oneshot::channel();
            bus.commands_tx
                .try_send(LocalCommand { payload: Vec::new(), reply })
                .unwrap();
            parked.push(answer);
        }
        assert_eq!(bus.commands_tx.capacity(), 0);

        let request = bus.request(b"x".to_vec(), Duration::from_millis(20));
        let result = tokio::time::timeout(Duration::from_secs(2), request).await.unwrap();
        assert!(
            matches!(&result, Err(MessagingError::Transport(msg)) if msg.starts_with("no reply within")),
            "{result:?}"
        );
    }
}
