//! Server bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use tickbridge_config::{Config, SocketPreparationError};

use crate::context::BridgeContext;
use crate::dispatch::{CommandRegistry, Dispatcher, Handshake, HostInfo};
use crate::health::HealthReporter;
use crate::queue::SystemClock;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Version reported for the headless host.
pub const HEADLESS_HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    ///
    /// # Errors
    ///
    /// Propagates layered configuration failures.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful bootstrap: configuration plus the shared context.
#[derive(Debug)]
pub struct Server {
    config: Config,
    context: Arc<BridgeContext>,
    telemetry: TelemetryHandle,
}

impl Server {
    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Context shared by the listener and the execution pump.
    #[must_use]
    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.context
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Loads configuration, installs telemetry and assembles the shared context
/// around `registry`.
///
/// Every stage reports to `reporter`; the first failure is reported and
/// returned.
///
/// # Errors
///
/// Returns the [`BootstrapError`] for the first stage that failed.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    registry: CommandRegistry,
) -> Result<Server, BootstrapError> {
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| fail(BootstrapError::Socket { source }))?;

    let host = HostInfo::new(config.host_name(), HEADLESS_HOST_VERSION);
    let dispatcher = Dispatcher::new(registry, Handshake::new(host));
    let context = Arc::new(BridgeContext::from_config(
        &config,
        dispatcher,
        Arc::new(SystemClock),
    ));
    reporter.bootstrap_succeeded(&config);

    Ok(Server {
        config,
        context,
        telemetry,
    })
}
