//! Shutdown signal that scenarios trigger by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::process::{ShutdownError, ShutdownSignal};

#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    triggered: Arc<AtomicBool>,
    flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that has already fired; the server stops on its first tick.
    pub fn triggered() -> Self {
        let signal = Self::new();
        signal.trigger();
        signal
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        for flag in self.flags.lock().expect("shutdown mutex poisoned").iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn register(&self, flag: Arc<AtomicBool>) -> Result<(), ShutdownError> {
        if self.triggered.load(Ordering::SeqCst) {
            flag.store(true, Ordering::SeqCst);
        }
        self.flags
            .lock()
            .expect("shutdown mutex poisoned")
            .push(flag);
        Ok(())
    }
}
