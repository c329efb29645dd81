//! Shared configuration for the tickbridge command server.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, an
//! optional TOML file (`--config-path` or `TICKBRIDGE_CONFIG_PATH`),
//! `TICKBRIDGE_*` environment variables, and finally command-line flags.
//! Both the server and the protocol client read the same structure so they
//! agree on the listening endpoint and runtime directory.

mod defaults;
mod logging;
mod runtime;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACCEPT_ERROR_LIMIT, DEFAULT_HOST_NAME, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_PENDING_RESPONSES, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT,
    DEFAULT_TICK_INTERVAL_MS, DEFAULT_WRITE_TIMEOUT_MS, default_log_filter, default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration for the command server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TICKBRIDGE")]
pub struct Config {
    /// Endpoint the listener binds to.
    #[ortho_config(default = default_socket_endpoint())]
    pub listen_socket: SocketEndpoint,
    /// Tracing filter expression, for example `info,tickbridge::queue=debug`.
    #[ortho_config(default = default_log_filter().to_owned())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// How long a connection waits for a queued command to complete.
    #[ortho_config(default = DEFAULT_RESPONSE_TIMEOUT_MS)]
    pub response_timeout_ms: u64,
    /// Read timeout applied to each accepted connection.
    #[ortho_config(default = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,
    /// Write timeout applied to each accepted connection.
    #[ortho_config(default = DEFAULT_WRITE_TIMEOUT_MS)]
    pub write_timeout_ms: u64,
    /// Upper bound between deadline checks while waiting for a response.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Tick period of the headless host loop.
    #[ortho_config(default = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_interval_ms: u64,
    /// Largest inbound message accepted before the connection is rejected.
    #[ortho_config(default = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,
    /// Capacity of the response slot map before the oldest entries are evicted.
    #[ortho_config(default = DEFAULT_MAX_PENDING_RESPONSES)]
    pub max_pending_responses: usize,
    /// Consecutive accept failures tolerated before the listener aborts.
    /// Zero retries forever.
    #[ortho_config(default = DEFAULT_ACCEPT_ERROR_LIMIT)]
    pub accept_error_limit: u32,
    /// Overrides the directory holding the lock, pid marker and health files.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Host name reported by the handshake command.
    #[ortho_config(default = DEFAULT_HOST_NAME.to_owned())]
    pub host_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_pending_responses: DEFAULT_MAX_PENDING_RESPONSES,
            accept_error_limit: DEFAULT_ACCEPT_ERROR_LIMIT,
            runtime_dir: None,
            host_name: DEFAULT_HOST_NAME.to_owned(),
        }
    }
}

impl Config {
    /// Loads the layered configuration using the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or merged.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the layered configuration from explicit command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or merged.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the listener binds to.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Structured log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Deadline for queued commands.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Per-connection read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    /// Per-connection write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }

    /// Maximum gap between deadline checks while waiting on a response slot.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Tick period of the headless host.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Largest accepted request in bytes.
    #[must_use]
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Capacity of the response slot map.
    #[must_use]
    pub fn max_pending_responses(&self) -> usize {
        self.max_pending_responses.max(1)
    }

    /// Consecutive accept failures tolerated; `None` means unlimited.
    #[must_use]
    pub fn accept_error_limit(&self) -> Option<u32> {
        (self.accept_error_limit != 0).then_some(self.accept_error_limit)
    }

    /// Host name reported by the handshake.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }
}
