//! Socket transport for the command server.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread, serving each one to completion before accepting the
//! next. A connection carries exactly one request and one response.

mod connection;
mod errors;
mod handler;
mod listener;

pub use self::connection::{BridgeConnectionHandler, ConnectionSettings, ResponseWriter};
pub use self::errors::{ConnectionError, ListenerError};
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
