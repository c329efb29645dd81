//! Ownership-transfer queue between the network thread and the execution
//! thread.
//!
//! The listener enqueues a command and blocks on its response slot; the pump
//! pops commands in arrival order, dispatches them and posts the result. Both
//! halves share one mutex so a posted response becomes visible atomically,
//! and a condition variable wakes the waiter as soon as it lands.
//!
//! A waiter that times out abandons its request id. The command itself stays
//! queued and still runs; its late result is discarded when posted.

mod clock;
mod errors;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use tickbridge_types::{Command, Response};

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::errors::QueueError;

pub(crate) const QUEUE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::queue");

/// Process-unique, strictly increasing identifier for a queued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// A command waiting for the execution thread.
#[derive(Debug)]
pub struct PendingRequest {
    /// Identifier the waiter is blocked on.
    pub id: RequestId,
    /// Command to dispatch.
    pub command: Command,
}

/// Tuning for the queue's waiting behaviour.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// Longest a waiter sleeps before re-checking its deadline.
    pub poll_interval: Duration,
    /// Response slots retained before the oldest is evicted.
    pub max_pending_responses: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<PendingRequest>,
    slots: BTreeMap<RequestId, Response>,
    abandoned: BTreeSet<RequestId>,
}

/// FIFO command queue with a parallel response slot map.
pub struct CommandQueue {
    state: Mutex<QueueState>,
    posted: Condvar,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandQueue")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CommandQueue {
    /// Creates an empty queue reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, settings: QueueSettings) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            posted: Condvar::new(),
            clock,
            settings,
        }
    }

    /// Appends a command and returns the id to wait on.
    ///
    /// # Errors
    ///
    /// Fails only when the queue lock is poisoned.
    pub fn enqueue(&self, command: Command) -> Result<RequestId, QueueError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = RequestId(state.next_id);
        debug!(
            target: QUEUE_TARGET,
            request_id = %id,
            command = command.kind(),
            depth = state.pending.len() + 1,
            "command queued"
        );
        state.pending.push_back(PendingRequest { id, command });
        Ok(id)
    }

    /// Pops the oldest queued command, if any.
    ///
    /// # Errors
    ///
    /// Fails only when the queue lock is poisoned.
    pub fn take_next(&self) -> Result<Option<PendingRequest>, QueueError> {
        Ok(self.lock()?.pending.pop_front())
    }

    /// Stores the response for `id` and wakes its waiter.
    ///
    /// Responses for abandoned ids are dropped. When the slot map is full the
    /// lowest id is evicted to make room.
    ///
    /// # Errors
    ///
    /// Fails only when the queue lock is poisoned.
    pub fn post_response(&self, id: RequestId, response: Response) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        if state.abandoned.remove(&id) {
            debug!(
                target: QUEUE_TARGET,
                request_id = %id,
                "discarding response for abandoned request"
            );
            return Ok(());
        }
        while state.slots.len() >= self.settings.max_pending_responses.max(1) {
            let Some((evicted, _)) = state.slots.pop_first() else {
                break;
            };
            warn!(
                target: QUEUE_TARGET,
                request_id = %evicted,
                "evicting unclaimed response"
            );
        }
        state.slots.insert(id, response);
        drop(state);
        self.posted.notify_all();
        Ok(())
    }

    /// Blocks until the response for `id` is posted or `timeout` elapses.
    ///
    /// The deadline is measured with the queue's clock and re-checked at least
    /// once per poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TimedOut`] after the deadline, at which point the
    /// id is abandoned.
    pub fn try_take_response(
        &self,
        id: RequestId,
        timeout: Duration,
    ) -> Result<Response, QueueError> {
        let started = self.clock.now();
        let deadline = started.checked_add(timeout);
        let mut state = self.lock()?;
        loop {
            if let Some(response) = state.slots.remove(&id) {
                return Ok(response);
            }
            let now = self.clock.now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                state.abandoned.insert(id);
                warn!(
                    target: QUEUE_TARGET,
                    request_id = %id,
                    timeout_ms = timeout.as_millis(),
                    "command timed out"
                );
                return Err(QueueError::TimedOut {
                    id,
                    waited: now.saturating_duration_since(started),
                });
            }
            let wait = deadline.map_or(self.settings.poll_interval, |deadline| {
                deadline
                    .saturating_duration_since(now)
                    .min(self.settings.poll_interval)
            });
            state = self
                .posted
                .wait_timeout(state, wait)
                .map_err(|_| QueueError::Poisoned)?
                .0;
        }
    }

    /// Number of commands waiting for the execution thread.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lock().map_or(0, |state| state.pending.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state.lock().map_err(|_| QueueError::Poisoned)
    }
}
