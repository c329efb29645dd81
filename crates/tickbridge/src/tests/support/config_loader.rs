//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::OrthoError;
use tempfile::TempDir;

use tickbridge_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader binding an ephemeral loopback port with runtime files under a
/// temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    runtime_dir: Arc<TempDir>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary runtime directory");
        Self {
            runtime_dir: Arc::new(dir),
        }
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.runtime_dir.path().to_path_buf()
    }

    pub fn config(&self) -> Config {
        let runtime_dir = Utf8PathBuf::from_path_buf(self.runtime_dir())
            .expect("temporary runtime path was not valid UTF-8");
        Config {
            listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            log_filter: "warn".to_owned(),
            tick_interval_ms: 5,
            poll_interval_ms: 10,
            read_timeout_ms: 500,
            runtime_dir: Some(runtime_dir),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that intentionally fails by passing an invalid CLI argument.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("tickbridge"),
            OsString::from("--response-timeout-ms"),
            OsString::from("not-a-number"),
        ];
        Config::load_from_iter(args)
    }
}
