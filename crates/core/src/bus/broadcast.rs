//! In-process bus backed by a tokio broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{BusError, MessageBus};

/// A message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Broadcast-channel message bus.
///
/// Cheaply cloneable; all clones share the same channel. Messages published
/// with no subscribers are dropped, matching a fire-and-forget transport.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<BusMessage>,
    closed: Arc<AtomicBool>,
}

impl BroadcastBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to every message on exactly `subject`.
    pub fn subscribe(&self, subject: impl Into<String>) -> Subscription {
        Subscription {
            subject: subject.into(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Close the bus; later publishes fail with [`BusError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl MessageBus for BroadcastBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        // A send error only means nobody is listening
        let _ = self.sender.send(BusMessage {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }
}

/// A filtered view of the bus for one subject.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Waits for the next message on this subject.
    ///
    /// Returns `None` once the bus has been dropped. Lagged messages are
    /// skipped with a warning.
    pub async fn next(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if msg.subject == self.subject => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subject = %self.subject, skipped, "Subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(subject = %self.subject, "Bus dropped, ending subscription");
                    return None;
                }
            }
        }
    }
}
