//! Runtime clock
//!
//! Retry deadlines are kept as [`Timestamp`]s from the core crate. This
//! source reads the tokio timer, so deadlines and `tokio::time::sleep`
//! agree, including under a paused test clock.

use plantlink_core::time::{TimeSource, Timestamp};
use tokio::time::Instant;

/// Milliseconds since the clock was created, on the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}
