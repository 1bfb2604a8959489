//! Byte-stream relay onto the message bus.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::ProgressError;
use crate::bus::{log_subject, MessageBus};

const RELAY_CHUNK: usize = 8 * 1024;

/// Publishes every write as one message on `log.<workflow_id>`.
///
/// Nothing is buffered across writes, so output chunking is visible to
/// subscribers as-is.
#[derive(Clone)]
pub struct ProgressSink {
    bus: Arc<dyn MessageBus>,
    subject: String,
}

impl ProgressSink {
    pub fn new(bus: Arc<dyn MessageBus>, workflow_id: &str) -> Self {
        Self {
            bus,
            subject: log_subject(workflow_id),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Publishes `bytes` as one message and reports them all consumed.
    pub async fn write(&self, bytes: &[u8]) -> Result<usize, ProgressError> {
        self.bus.publish(&self.subject, bytes.to_vec()).await?;
        Ok(bytes.len())
    }

    /// Publishes a text line.
    pub async fn write_str(&self, text: &str) -> Result<usize, ProgressError> {
        self.write(text.as_bytes()).await
    }

    /// Forwards `reader` until EOF, one message per read.
    ///
    /// Returns the number of bytes relayed.
    pub async fn relay<R>(&self, mut reader: R) -> Result<u64, ProgressError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; RELAY_CHUNK];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf).await.map_err(ProgressError::Read)?;
            if n == 0 {
                return Ok(total);
            }
            self.write(&buf[..n]).await?;
            total += n as u64;
        }
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
