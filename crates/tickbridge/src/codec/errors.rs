//! Error types for message framing.

use std::io;

use thiserror::Error;

/// Errors surfaced while framing a single JSON message from a stream.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed or stalled before sending any bytes.
    #[error("no data received")]
    NoData,
    /// The buffered bytes can never become a valid JSON document.
    #[error("malformed JSON: {source}")]
    Malformed {
        /// Parser error that rejected the input.
        #[source]
        source: serde_json::Error,
    },
    /// The message grew past the configured limit.
    #[error("message too large: {size} bytes exceeds {limit} byte limit")]
    TooLarge {
        /// Bytes buffered when the limit was hit.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Reading from the stream failed.
    #[error("failed to read message: {0}")]
    Io(#[from] io::Error),
}
