//! Mock message bus for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bus::{BusError, BusMessage, MessageBus};

/// Mock implementation of the MessageBus trait.
///
/// Records every published message for assertions and can be told to fail
/// the next publish or every publish.
#[derive(Debug, Default)]
pub struct MockMessageBus {
    messages: Arc<RwLock<Vec<BusMessage>>>,
    next_error: Arc<RwLock<Option<BusError>>>,
    fail_all: Arc<RwLock<Option<BusError>>>,
}

impl MockMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded messages in publish order.
    pub async fn messages(&self) -> Vec<BusMessage> {
        self.messages.read().await.clone()
    }

    /// Payloads published on `subject`, as text.
    pub async fn messages_on(&self, subject: &str) -> Vec<String> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.subject == subject)
            .map(BusMessage::text)
            .collect()
    }

    pub async fn clear(&self) {
        self.messages.write().await.clear();
    }

    /// Configure the next publish to fail with the given error.
    pub async fn set_next_error(&self, error: BusError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every publish until [`recover`](Self::recover) is called.
    pub async fn fail_all(&self, error: BusError) {
        *self.fail_all.write().await = Some(error);
    }

    pub async fn recover(&self) {
        *self.fail_all.write().await = None;
        *self.next_error.write().await = None;
    }
}

#[async_trait]
impl MessageBus for MockMessageBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(err) = self.fail_all.read().await.clone() {
            return Err(err);
        }

        self.messages.write().await.push(BusMessage {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }
}
