//! Command dispatch: handler contract, registry and dispatcher.
//!
//! Every inbound command is routed by its `type` field. The built-in
//! `handshake` is always available; everything else comes from a
//! [`CommandRegistry`] fixed at startup. The dispatcher guarantees exactly one
//! [`Response`](tickbridge_types::Response) per command: unknown types,
//! handler errors and handler panics all become failure responses.

mod dispatcher;
mod errors;
mod handler;
mod handshake;
mod registry;

pub use self::dispatcher::{Dispatcher, Route};
pub use self::errors::{HandlerError, RegistryError};
pub use self::handler::{Affinity, CommandHandler, FnHandler};
pub use self::handshake::{Handshake, HostInfo, SERVER_VERSION};
pub use self::registry::{CommandRegistry, RegistryBuilder};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
