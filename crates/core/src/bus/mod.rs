//! Publish-only message bus used for progress and upload notices.
//!
//! Subjects are scoped per run: `log.<workflow_id>`. Publishing needs no
//! acknowledgement, but a failed publish is reported to the caller so that
//! activities can treat lost observability as a failure.

mod broadcast;

pub use broadcast::{BroadcastBus, BusMessage, Subscription};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when publishing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus connection has been closed.
    #[error("Message bus is closed")]
    Closed,

    /// The transport rejected the message.
    #[error("Failed to publish to {subject}: {reason}")]
    PublishFailed { subject: String, reason: String },
}

/// A subject-addressed, publish-only message bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes one message on `subject`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Subject carrying free-text progress for one run.
pub fn log_subject(workflow_id: &str) -> String {
    format!("log.{}", workflow_id)
}
