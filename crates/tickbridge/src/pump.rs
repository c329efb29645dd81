//! Execution-thread pump driven by the host's tick callback.
//!
//! Each tick dispatches at most one queued command so a burst of requests
//! never stalls a frame for longer than a single handler takes. The pump is
//! the only place state-touching handlers run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use crate::context::BridgeContext;
use crate::queue::QUEUE_TARGET;

/// Callback invoked once per host tick on the execution thread.
pub type TickCallback = Box<dyn FnMut() + Send>;

/// Token identifying a registered tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    /// Wraps a scheduler-assigned identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Scheduler-assigned identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Errors reported by a tick scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The host no longer accepts callbacks.
    #[error("tick scheduler has stopped")]
    Stopped,
}

/// Host facility running callbacks on its main loop.
#[cfg_attr(test, mockall::automock)]
pub trait TickScheduler: Send + Sync {
    /// Registers `callback` to run once per tick.
    ///
    /// # Errors
    ///
    /// Fails when the host is shutting down.
    fn register(&self, callback: TickCallback) -> Result<TickHandle, SchedulerError>;

    /// Removes a previously registered callback.
    fn unregister(&self, handle: TickHandle);
}

/// Errors raised while installing the pump.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The pump is already registered with a scheduler.
    #[error("execution pump is already installed")]
    AlreadyInstalled,
    /// The scheduler refused the callback.
    #[error("failed to register execution pump: {source}")]
    Scheduler {
        /// Scheduler error.
        #[source]
        source: SchedulerError,
    },
}

/// Drains the command queue from the host's execution thread.
#[derive(Debug)]
pub struct ExecutionPump {
    context: Arc<BridgeContext>,
    installed: AtomicBool,
}

impl ExecutionPump {
    /// Creates a pump over `context`.
    #[must_use]
    pub fn new(context: Arc<BridgeContext>) -> Arc<Self> {
        Arc::new(Self {
            context,
            installed: AtomicBool::new(false),
        })
    }

    /// Dispatches at most one queued command. Returns whether work was done.
    pub fn pump_one(&self) -> bool {
        self.context.pump_one()
    }

    /// Registers the pump with `scheduler`.
    ///
    /// # Errors
    ///
    /// Returns [`PumpError::AlreadyInstalled`] while a previous registration
    /// is alive, or the scheduler's refusal.
    pub fn install(
        self: &Arc<Self>,
        scheduler: Arc<dyn TickScheduler>,
    ) -> Result<PumpRegistration, PumpError> {
        if self.installed.swap(true, Ordering::SeqCst) {
            return Err(PumpError::AlreadyInstalled);
        }
        let pump = Arc::clone(self);
        let callback: TickCallback = Box::new(move || {
            pump.pump_one();
        });
        match scheduler.register(callback) {
            Ok(handle) => {
                info!(target: QUEUE_TARGET, handle = handle.get(), "execution pump installed");
                Ok(PumpRegistration {
                    scheduler,
                    handle,
                    pump: Arc::clone(self),
                })
            }
            Err(source) => {
                self.installed.store(false, Ordering::SeqCst);
                Err(PumpError::Scheduler { source })
            }
        }
    }
}

/// Live registration of the pump; unregisters when dropped.
pub struct PumpRegistration {
    scheduler: Arc<dyn TickScheduler>,
    handle: TickHandle,
    pump: Arc<ExecutionPump>,
}

impl PumpRegistration {
    /// Scheduler handle of the registered callback.
    #[must_use]
    pub fn handle(&self) -> TickHandle {
        self.handle
    }
}

impl fmt::Debug for PumpRegistration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PumpRegistration")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for PumpRegistration {
    fn drop(&mut self) {
        self.scheduler.unregister(self.handle);
        self.pump.installed.store(false, Ordering::SeqCst);
        debug!(target: QUEUE_TARGET, handle = self.handle.get(), "execution pump unregistered");
    }
}
