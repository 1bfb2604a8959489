//! Progress reporting for long-running activities.
//!
//! - [`ProgressSink`] relays subprocess output to `log.<workflow_id>`
//! - [`HeartbeatGuard`] / [`with_heartbeat`] keep the engine informed that
//!   a blocking operation is still alive

mod heartbeat;
mod sink;

pub use heartbeat::{with_heartbeat, HeartbeatGuard};
pub use sink::ProgressSink;

use thiserror::Error;

use crate::bus::BusError;

/// Errors that can occur while relaying progress.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The bus rejected a progress message.
    #[error("Failed to publish progress: {0}")]
    Publish(#[from] BusError),

    /// Reading the source stream failed.
    #[error("Failed to read progress stream: {0}")]
    Read(#[source] std::io::Error),
}
