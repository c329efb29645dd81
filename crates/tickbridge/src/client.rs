//! Blocking protocol client for the command server.
//!
//! Mirrors what an agent adapter does: connect, write one command, read one
//! response framed by the same completion-by-reparse codec, disconnect.

use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use thiserror::Error;

use tickbridge_config::{Config, SocketEndpoint};
use tickbridge_types::{Command, HANDSHAKE_COMMAND, Response};

use crate::codec::{Frame, FrameError, read_frame};
use crate::transport::ConnectionStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Errors surfaced by [`BridgeClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting to the server failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint dialled.
        endpoint: String,
        /// Connect error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Endpoint requested.
        endpoint: String,
    },
    /// Sending the command failed.
    #[error("failed to send command: {0}")]
    Send(#[source] io::Error),
    /// The response could not be framed.
    #[error("failed to read response: {0}")]
    Frame(#[from] FrameError),
    /// The server closed or stalled mid-response.
    #[error("response incomplete after {bytes} bytes")]
    Incomplete {
        /// Bytes received.
        bytes: usize,
    },
    /// The response was JSON but not a valid response object.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server answered the probe with a failure.
    #[error("server rejected handshake: {message}")]
    Rejected {
        /// Error reported by the server.
        message: String,
    },
}

/// Client issuing one command per connection.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    endpoint: SocketEndpoint,
    timeout: Duration,
    max_response_bytes: usize,
}

impl BridgeClient {
    /// Creates a client for `endpoint` with default limits.
    #[must_use]
    pub fn new(endpoint: SocketEndpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_CLIENT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Creates a client for the configured listen socket.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.listen_socket().clone())
    }

    /// Overrides the per-read and per-write timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint the client dials.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Sends `command` and waits for its response.
    ///
    /// # Errors
    ///
    /// Fails when the server cannot be reached or the response is unreadable.
    /// A failure response from the server is returned as `Ok`.
    pub fn send(&self, command: &Command) -> Result<Response, ClientError> {
        let mut stream = self.connect()?;
        let payload = serde_json::to_vec(command)?;
        stream.write_all(&payload).map_err(ClientError::Send)?;
        stream.flush().map_err(ClientError::Send)?;
        match read_frame(&mut stream, self.max_response_bytes)? {
            Frame::Complete(value) => Ok(serde_json::from_value(value)?),
            Frame::Partial { bytes, .. } => Err(ClientError::Incomplete { bytes: bytes.len() }),
        }
    }

    /// Performs a handshake to check the server is alive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the server answers with a
    /// failure, or any transport error from [`BridgeClient::send`].
    pub fn probe(&self, message: &str) -> Result<Response, ClientError> {
        let response = self.send(&Command::new(HANDSHAKE_COMMAND).with_field("message", message))?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Rejected {
                message: response.error().unwrap_or_default().to_owned(),
            })
        }
    }

    fn connect(&self) -> Result<ConnectionStream, ClientError> {
        let connect_error = |source| ClientError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        };
        let stream = match &self.endpoint {
            SocketEndpoint::Tcp { host, port } => {
                ConnectionStream::Tcp(TcpStream::connect((host.as_str(), *port)).map_err(connect_error)?)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                ConnectionStream::Unix(UnixStream::connect(path.as_std_path()).map_err(connect_error)?)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ClientError::UnsupportedUnix {
                    endpoint: self.endpoint.to_string(),
                });
            }
        };
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.timeout)))
            .map_err(connect_error)?;
        Ok(stream)
    }
}
