//! Completion-by-reparse framing for JSON messages without a length prefix.
//!
//! The peer sends exactly one JSON document and may keep the connection open
//! afterwards, so the end of a message cannot be detected from the stream
//! closing. Instead the decoder re-parses the whole buffer after every chunk.
//! A parse that fails only because input ended early means more bytes are
//! needed; any other parse failure means the message is malformed and no
//! amount of extra input will fix it.
//!
//! A top-level scalar that is also a prefix of a longer document (for example
//! `12` followed later by `34`) completes as soon as the first chunk parses.
//! Commands are always objects, so such input is rejected one layer up.

mod errors;

use std::io::{self, Read};

use serde_json::Value;

pub use self::errors::FrameError;

/// Size of each read issued against the stream.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Why framing stopped before a complete document arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialCause {
    /// The peer closed its write half.
    PeerClosed,
    /// The stream read timeout elapsed.
    TimedOut,
}

/// Result of framing one message.
#[derive(Debug)]
pub enum Frame {
    /// A complete JSON document.
    Complete(Value),
    /// Bytes received before the stream ended or stalled.
    Partial {
        /// Everything buffered so far.
        bytes: Vec<u8>,
        /// What ended the read.
        cause: PartialCause,
    },
}

/// Incremental decoder accumulating chunks until they form one JSON value.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    limit: usize,
}

impl FrameDecoder {
    /// Creates a decoder that rejects messages larger than `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Appends a chunk and attempts to parse the whole buffer.
    ///
    /// Returns `Ok(Some(value))` once the buffer holds a complete document and
    /// `Ok(None)` while more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] when the buffer exceeds the limit and
    /// [`FrameError::Malformed`] when the buffer can never parse.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Value>, FrameError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > self.limit {
            return Err(FrameError::TooLarge {
                size: self.buffer.len(),
                limit: self.limit,
            });
        }
        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_eof() => Ok(None),
            Err(source) => Err(FrameError::Malformed { source }),
        }
    }

    /// Bytes buffered so far.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Ends framing early, returning whatever was buffered.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NoData`] when nothing was buffered.
    pub fn finish(self, cause: PartialCause) -> Result<Frame, FrameError> {
        if self.buffer.is_empty() {
            return Err(FrameError::NoData);
        }
        Ok(Frame::Partial {
            bytes: self.buffer,
            cause,
        })
    }
}

/// Reads one JSON message from `reader` in [`CHUNK_SIZE`] chunks.
///
/// Returns as soon as the buffered bytes parse, without waiting for the peer
/// to close. A zero-length read or read timeout yields whatever was buffered
/// as [`Frame::Partial`].
///
/// # Errors
///
/// Fails when nothing arrives, the input is malformed, the limit is exceeded
/// or the stream reports an error other than a timeout.
pub fn read_frame<R: Read>(reader: &mut R, limit: usize) -> Result<Frame, FrameError> {
    let mut decoder = FrameDecoder::new(limit);
    let mut chunk = vec![0_u8; CHUNK_SIZE];
    loop {
        let bytes_read = match read_with_retry(reader, &mut chunk) {
            Ok(read) => read,
            Err(error) if is_timeout(&error) => return decoder.finish(PartialCause::TimedOut),
            Err(error) => return Err(FrameError::Io(error)),
        };
        if bytes_read == 0 {
            return decoder.finish(PartialCause::PeerClosed);
        }
        let received = chunk.get(..bytes_read).unwrap_or_default();
        if let Some(value) = decoder.push(received)? {
            return Ok(Frame::Complete(value));
        }
    }
}

fn read_with_retry<R: Read>(reader: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
