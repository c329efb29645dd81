//! Shared doubles and harnesses for the behavioural suites.

mod config_loader;
mod reporter;
mod server;
mod shutdown;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use server::{BridgeHarness, HarnessOptions};
pub use shutdown::TestShutdownSignal;
