//! Heartbeater that counts beats.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{HeartbeatError, Heartbeater};

/// Records heartbeats; optionally starts rejecting them after a number of
/// successful beats.
#[derive(Debug, Default)]
pub struct RecordingHeartbeater {
    beats: AtomicU64,
    fail_after: Option<u64>,
}

impl RecordingHeartbeater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `beats` heartbeats, then rejects every later one.
    pub fn failing_after(beats: u64) -> Self {
        Self {
            beats: AtomicU64::new(0),
            fail_after: Some(beats),
        }
    }

    /// Number of accepted heartbeats.
    pub fn count(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

impl Heartbeater for RecordingHeartbeater {
    fn record_heartbeat(&self) -> Result<(), HeartbeatError> {
        if let Some(limit) = self.fail_after {
            if self.count() >= limit {
                return Err(HeartbeatError::Rejected("engine stopped tracking".to_string()));
            }
        }
        self.beats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
