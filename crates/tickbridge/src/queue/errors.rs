//! Error types for the command queue.

use std::time::Duration;

use thiserror::Error;

use super::RequestId;

/// Errors surfaced by the command queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No response was posted before the deadline.
    #[error("request {id} timed out after {waited:?}")]
    TimedOut {
        /// Request that was abandoned.
        id: RequestId,
        /// How long the waiter blocked.
        waited: Duration,
    },
    /// A thread panicked while holding the queue lock.
    #[error("command queue lock poisoned")]
    Poisoned,
}
