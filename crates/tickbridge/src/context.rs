//! Shared state joining the listener thread and the execution pump.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use tickbridge_config::Config;
use tickbridge_types::{Command, Response};

use crate::dispatch::{Dispatcher, Route};
use crate::queue::{Clock, CommandQueue, QUEUE_TARGET, QueueError, QueueSettings};

/// Queue, dispatcher and deadlines shared by `Arc` between the network thread
/// and the execution thread.
#[derive(Debug)]
pub struct BridgeContext {
    queue: CommandQueue,
    dispatcher: Dispatcher,
    response_timeout: Duration,
}

impl BridgeContext {
    /// Assembles a context from explicit parts.
    pub fn new(dispatcher: Dispatcher, queue: CommandQueue, response_timeout: Duration) -> Self {
        Self {
            queue,
            dispatcher,
            response_timeout,
        }
    }

    /// Builds a context using the queue tuning and deadline from `config`.
    pub fn from_config(config: &Config, dispatcher: Dispatcher, clock: Arc<dyn Clock>) -> Self {
        let settings = QueueSettings {
            poll_interval: config.poll_interval(),
            max_pending_responses: config.max_pending_responses(),
        };
        Self::new(
            dispatcher,
            CommandQueue::new(clock, settings),
            config.response_timeout(),
        )
    }

    /// Answers `command`, either inline or via the execution pump.
    ///
    /// Always returns a response: queue failures and timeouts are reported as
    /// failure responses.
    pub fn submit(&self, command: Command) -> Response {
        match self.dispatcher.route(command.kind()) {
            Route::Inline => self.dispatcher.dispatch(command),
            Route::Queued => self.submit_queued(command),
        }
    }

    fn submit_queued(&self, command: Command) -> Response {
        let outcome = self
            .queue
            .enqueue(command)
            .and_then(|id| self.queue.try_take_response(id, self.response_timeout));
        match outcome {
            Ok(response) => response,
            Err(QueueError::TimedOut { .. }) => Response::timed_out(),
            Err(error) => {
                error!(target: QUEUE_TARGET, %error, "command queue unavailable");
                Response::failure(error.to_string())
            }
        }
    }

    /// Dispatches at most one queued command. Returns whether work was done.
    ///
    /// Must only be called from the host's execution thread.
    pub fn pump_one(&self) -> bool {
        let pending = match self.queue.take_next() {
            Ok(Some(pending)) => pending,
            Ok(None) => return false,
            Err(error) => {
                error!(target: QUEUE_TARGET, %error, "failed to take queued command");
                return false;
            }
        };
        debug!(
            target: QUEUE_TARGET,
            request_id = %pending.id,
            command = pending.command.kind(),
            "executing queued command"
        );
        let response = self.dispatcher.dispatch(pending.command);
        if let Err(error) = self.queue.post_response(pending.id, response) {
            error!(target: QUEUE_TARGET, request_id = %pending.id, %error, "failed to post response");
        }
        true
    }

    /// Command queue.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Deadline applied to queued commands.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }
}
