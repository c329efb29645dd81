//! Error types for socket listener and connection handling.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::codec::FrameError;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint would accept connections from other machines.
    #[error("refusing to listen on non-loopback endpoint {endpoint}")]
    NotLoopback {
        /// Configured endpoint.
        endpoint: String,
    },
    /// The TCP host name could not be resolved.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no addresses.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP socket failed, typically because the port is taken.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        /// Spawn error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets were requested on a platform without them.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Binding the Unix socket failed.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Another process is serving the Unix socket.
    #[cfg(unix)]
    #[error("existing unix socket {path} is already in use")]
    UnixInUse {
        /// Socket path.
        path: String,
    },
    /// The configured path exists and is not a socket.
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Offending path.
        path: String,
    },
    /// Inspecting an existing socket file failed.
    #[cfg(unix)]
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: String,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[cfg(unix)]
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: String,
        /// Connect error.
        #[source]
        source: io::Error,
    },
    /// Removing a stale socket file failed.
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// Accepting connections kept failing.
    #[error("giving up after {failures} consecutive accept failures: {source}")]
    AcceptLimit {
        /// Consecutive failures observed.
        failures: u32,
        /// Most recent accept error.
        #[source]
        source: io::Error,
    },
    /// The listener thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Errors raised while servicing one connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Configuring the accepted stream failed.
    #[error("failed to configure connection: {0}")]
    Configure(#[source] io::Error),
    /// The request could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Serialising the response failed.
    #[error("failed to serialise response: {0}")]
    Serialise(#[from] serde_json::Error),
    /// Writing the response failed.
    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),
}
