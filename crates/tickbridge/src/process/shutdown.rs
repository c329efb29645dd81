use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
///
/// Implementations raise `flag` once the server should stop; the host loop
/// polls it between ticks.
pub trait ShutdownSignal: Send + Sync {
    /// Arranges for `flag` to be set when shutdown is requested.
    ///
    /// # Errors
    ///
    /// Fails when the notification mechanism cannot be installed.
    fn register(&self, flag: Arc<AtomicBool>) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that reacts to termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn register(&self, flag: Arc<AtomicBool>) -> Result<(), ShutdownError> {
        for signal in [SIGTERM, SIGINT, SIGQUIT, SIGHUP] {
            signal_hook::flag::register(signal, Arc::clone(&flag))
                .map_err(|source| ShutdownError::Install { source })?;
        }
        debug!(target: PROCESS_TARGET, "termination signal handlers installed");
        Ok(())
    }
}
