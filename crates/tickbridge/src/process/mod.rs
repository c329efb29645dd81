//! Process lifecycle: singleton guard, liveness marker, and the run loop.

mod errors;
mod files;
mod guard;
pub(crate) mod launch;
mod marker;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_server;
pub use marker::{LivenessMarker, MarkerEndpoint, MarkerError};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
