//! Remote-control command server for a 3D editor.
//!
//! An external agent adapter connects to a loopback socket, writes one JSON
//! command object, and reads back one JSON response before the connection
//! closes. Commands that touch editor state must run on the editor's main
//! thread, so the listener thread hands them to a [`CommandQueue`] and blocks
//! until the [`ExecutionPump`], driven once per host tick, has executed them
//! and posted the result.
//!
//! ## Request lifecycle
//!
//! 1. The listener accepts a connection and accumulates bytes until they form
//!    a complete JSON value (see [`codec`]).
//! 2. The [`Dispatcher`] decides whether the command is answered inline (the
//!    built-in handshake, unknown types, handlers declared
//!    [`Affinity::AnyThread`]) or queued for the execution thread.
//! 3. Queued commands receive a [`RequestId`]; the connection waits on that
//!    id until the pump posts the response or the deadline passes, in which
//!    case a timeout response is written and the late result discarded.
//!
//! Only one connection is served at a time and only one queued command runs
//! per tick.
//!
//! The `tickbridge` binary runs the server against a [`HeadlessHost`] with an
//! in-memory [`Scene`] so it can be exercised without an editor.

mod bootstrap;
mod client;
pub mod codec;
mod context;
mod dispatch;
mod health;
mod host;
mod process;
mod pump;
mod queue;
mod scene;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, HEADLESS_HOST_VERSION, Server, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use client::{BridgeClient, ClientError};
pub use context::BridgeContext;
pub use dispatch::{
    Affinity, CommandHandler, CommandRegistry, Dispatcher, FnHandler, HandlerError, Handshake,
    HostInfo, RegistryBuilder, RegistryError, Route, SERVER_VERSION,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use host::HeadlessHost;
pub use process::{
    LaunchError, LivenessMarker, MarkerEndpoint, MarkerError, ShutdownError, ShutdownSignal,
    SystemShutdownSignal, run_server,
};
pub use pump::{
    ExecutionPump, PumpError, PumpRegistration, SchedulerError, TickCallback, TickHandle,
    TickScheduler,
};
pub use queue::{
    Clock, CommandQueue, ManualClock, PendingRequest, QueueError, QueueSettings, RequestId,
    SystemClock,
};
pub use scene::{Actor, Scene};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use tickbridge_types::{Command, CommandParseError, HANDSHAKE_COMMAND, Response};
pub use transport::{
    BridgeConnectionHandler, ConnectionError, ConnectionHandler, ConnectionSettings,
    ConnectionStream, ListenerError, ListenerHandle, ResponseWriter, SocketListener,
};

#[cfg(test)]
mod tests;
