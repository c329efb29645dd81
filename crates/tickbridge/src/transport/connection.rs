//! Per-connection request handling: frame, decode, answer, close.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use tickbridge_config::Config;
use tickbridge_types::{Command, Response};

use crate::codec::{Frame, FrameError, PartialCause, read_frame};
use crate::context::BridgeContext;

use super::{ConnectionError, ConnectionHandler, ConnectionStream, LISTENER_TARGET};

/// Sockets reject a zero timeout, so shorter values are raised to this.
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Longest a single read may block before framing gives up.
    pub read_timeout: Duration,
    /// Longest a single write may block before the client is dropped.
    pub write_timeout: Duration,
    /// Largest request accepted.
    pub max_request_bytes: usize,
}

impl ConnectionSettings {
    /// Reads the limits from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            max_request_bytes: config.max_request_bytes(),
        }
    }

    fn apply(&self, stream: &ConnectionStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.read_timeout.max(MIN_SOCKET_TIMEOUT)))?;
        stream.set_write_timeout(Some(self.write_timeout.max(MIN_SOCKET_TIMEOUT)))
    }
}

/// Serialises a single response onto a stream.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `response` as one JSON object and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let payload = serde_json::to_vec(response)?;
        self.writer
            .write_all(&payload)
            .map_err(ConnectionError::Write)?;
        self.writer.flush().map_err(ConnectionError::Write)
    }
}

/// Connection handler serving one command per connection.
#[derive(Debug)]
pub struct BridgeConnectionHandler {
    context: Arc<BridgeContext>,
    settings: ConnectionSettings,
}

impl BridgeConnectionHandler {
    /// Creates a handler answering through `context`.
    pub fn new(context: Arc<BridgeContext>, settings: ConnectionSettings) -> Self {
        Self { context, settings }
    }

    fn serve(&self, stream: &mut ConnectionStream) -> Result<(), ConnectionError> {
        let response = match self.settings.apply(stream) {
            Ok(()) => match read_frame(stream, self.settings.max_request_bytes) {
                Ok(frame) => self.answer(frame),
                Err(error) => {
                    warn!(target: LISTENER_TARGET, %error, "failed to read request");
                    frame_error_response(&error)
                }
            },
            Err(source) => {
                let error = ConnectionError::Configure(source);
                warn!(target: LISTENER_TARGET, %error, "failed to configure connection");
                Response::failure(error.to_string())
            }
        };
        ResponseWriter::new(&mut *stream).write_response(&response)
    }

    fn answer(&self, frame: Frame) -> Response {
        match frame {
            Frame::Complete(value) => match Command::try_from(value) {
                Ok(command) => {
                    let kind = command.kind().to_owned();
                    let response = self.context.submit(command);
                    debug!(
                        target: LISTENER_TARGET,
                        command = %kind,
                        success = response.is_success(),
                        "command answered"
                    );
                    response
                }
                Err(error) => {
                    warn!(target: LISTENER_TARGET, %error, "invalid command");
                    Response::failure(format!("Invalid command: {error}"))
                }
            },
            Frame::Partial { bytes, cause } => {
                let reason = match cause {
                    PartialCause::PeerClosed => "connection closed",
                    PartialCause::TimedOut => "read timed out",
                };
                warn!(
                    target: LISTENER_TARGET,
                    bytes = bytes.len(),
                    reason,
                    "incomplete request"
                );
                Response::failure(format!(
                    "Malformed JSON: message incomplete after {} bytes ({reason})",
                    bytes.len()
                ))
            }
        }
    }
}

impl ConnectionHandler for BridgeConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        match self.serve(&mut stream) {
            Ok(()) => {}
            Err(ConnectionError::Write(source))
                if matches!(
                    source.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                warn!(
                    target: LISTENER_TARGET,
                    error = %source,
                    "client stopped reading; dropping connection"
                );
            }
            Err(error) => warn!(target: LISTENER_TARGET, %error, "connection handler error"),
        }
        if let Err(error) = stream.close() {
            debug!(target: LISTENER_TARGET, %error, "failed to close connection");
        }
    }
}

fn frame_error_response(error: &FrameError) -> Response {
    match error {
        FrameError::NoData => Response::failure("No data received"),
        FrameError::Malformed { source } => Response::failure(format!("Malformed JSON: {source}")),
        FrameError::TooLarge { size, limit } => Response::failure(format!(
            "Request too large: {size} bytes exceeds {limit} byte limit"
        )),
        FrameError::Io(source) => Response::failure(format!("Failed to read request: {source}")),
    }
}
