//! Minimal host main loop for running the server without an editor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::pump::{SchedulerError, TickCallback, TickHandle, TickScheduler};

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Fixed-rate tick loop standing in for an editor's main loop.
///
/// Callbacks run on whichever thread drives [`HeadlessHost::run_until`] or
/// [`HeadlessHost::tick`]; that thread is the execution thread. Callbacks must
/// not register or unregister callbacks themselves.
pub struct HeadlessHost {
    tick_interval: Duration,
    callbacks: Mutex<BTreeMap<TickHandle, TickCallback>>,
    next_handle: AtomicU64,
    stopped: AtomicBool,
}

impl fmt::Debug for HeadlessHost {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HeadlessHost")
            .field("tick_interval", &self.tick_interval)
            .field("callbacks", &self.callback_count())
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

impl HeadlessHost {
    /// Creates a host ticking every `tick_interval`.
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            callbacks: Mutex::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
        }
    }

    /// Runs every registered callback once, in registration order.
    pub fn tick(&self) {
        let mut callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for callback in callbacks.values_mut() {
            callback();
        }
    }

    /// Ticks at the configured rate until `should_stop` returns true or the
    /// host is stopped. Returns the number of ticks run.
    pub fn run_until(&self, mut should_stop: impl FnMut() -> bool) -> u64 {
        info!(
            target: HOST_TARGET,
            tick_ms = self.tick_interval.as_millis(),
            "headless host running"
        );
        let mut ticks = 0_u64;
        while !self.is_stopped() && !should_stop() {
            let started = Instant::now();
            self.tick();
            ticks += 1;
            if let Some(remaining) = self.tick_interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        info!(target: HOST_TARGET, ticks, "headless host stopped");
        ticks
    }

    /// Stops the run loop and refuses further registrations.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether [`HeadlessHost::stop`] was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks
            .lock()
            .map_or(0, |callbacks| callbacks.len())
    }
}

impl TickScheduler for HeadlessHost {
    fn register(&self, callback: TickCallback) -> Result<TickHandle, SchedulerError> {
        if self.is_stopped() {
            return Err(SchedulerError::Stopped);
        }
        let handle = TickHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.callbacks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(handle, callback);
        debug!(target: HOST_TARGET, handle = handle.get(), "tick callback registered");
        Ok(handle)
    }

    fn unregister(&self, handle: TickHandle) {
        let removed = self
            .callbacks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&handle);
        if removed.is_some() {
            debug!(target: HOST_TARGET, handle = handle.get(), "tick callback unregistered");
        }
    }
}
