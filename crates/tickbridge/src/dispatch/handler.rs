//! Handler contract consumed by the dispatcher.

use tickbridge_types::{Command, Response};

use super::errors::HandlerError;

/// Thread a handler is allowed to run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Affinity {
    /// Touches host state; queued and run by the execution pump.
    #[default]
    ExecutionThread,
    /// State-free; answered inline on the network thread.
    AnyThread,
}

/// Executes one command type.
///
/// Handlers receive the full command and validate their own arguments.
/// Returning an error produces a failure response; panics are caught by the
/// dispatcher and reported the same way.
pub trait CommandHandler: Send + Sync {
    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] describing why the command failed.
    fn handle(&self, command: Command) -> Result<Response, HandlerError>;

    /// Where the handler may run. Defaults to the execution thread.
    fn affinity(&self) -> Affinity {
        Affinity::ExecutionThread
    }
}

/// Adapts a closure into a [`CommandHandler`].
pub struct FnHandler<F> {
    function: F,
    affinity: Affinity,
}

impl<F> FnHandler<F>
where
    F: Fn(Command) -> Result<Response, HandlerError> + Send + Sync,
{
    /// Wraps `function` as an execution-thread handler.
    pub fn new(function: F) -> Self {
        Self {
            function,
            affinity: Affinity::ExecutionThread,
        }
    }

    /// Marks the handler as state-free so it runs inline.
    #[must_use]
    pub fn any_thread(mut self) -> Self {
        self.affinity = Affinity::AnyThread;
        self
    }
}

impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(Command) -> Result<Response, HandlerError> + Send + Sync,
{
    fn handle(&self, command: Command) -> Result<Response, HandlerError> {
        (self.function)(command)
    }

    fn affinity(&self) -> Affinity {
        self.affinity
    }
}
