//! Derives runtime artefact paths shared by the server and its companions.
//!
//! The runtime directory houses the startup lock, the liveness marker (pid and
//! listening port) and the health snapshot. A co-located agent adapter reads
//! the marker to decide whether a server is already running, so both sides
//! must agree on the layout.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{Config, SocketEndpoint};

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

const LOCK_FILE: &str = "tickbridge.lock";
const MARKER_FILE: &str = "tickbridge.pid";
const HEALTH_FILE: &str = "tickbridge.health";

/// Canonical paths for runtime artefacts written by the server.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    marker_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the shared configuration, creating the
    /// directory when it does not exist yet.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = runtime_directory(config)?;
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self::within(runtime_dir))
    }

    /// Lays out the artefacts inside an explicit directory without touching
    /// the filesystem.
    #[must_use]
    pub fn within(runtime_dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = runtime_dir.into();
        Self {
            lock_path: runtime_dir.join(LOCK_FILE),
            marker_path: runtime_dir.join(MARKER_FILE),
            health_path: runtime_dir.join(HEALTH_FILE),
            runtime_dir,
        }
    }

    /// Directory holding runtime artefacts.
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the liveness marker holding the pid and listening port.
    pub fn marker_path(&self) -> &Path {
        self.marker_path.as_path()
    }

    /// Path to the health snapshot.
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }
}

fn runtime_directory(config: &Config) -> Result<PathBuf, RuntimePathsError> {
    if let Some(dir) = &config.runtime_dir {
        return Ok(dir.as_std_path().to_path_buf());
    }
    match config.listen_socket() {
        SocketEndpoint::Unix { path } => {
            match path.parent().filter(|parent| !parent.as_str().is_empty()) {
                Some(parent) => Ok(parent.as_std_path().to_path_buf()),
                None => Err(RuntimePathsError::MissingSocketParent {
                    path: path.to_string(),
                }),
            }
        }
        SocketEndpoint::Tcp { .. } => Ok(default_runtime_directory()),
    }
}

fn default_runtime_directory() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push("tickbridge");
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push("tickbridge");
        // SAFETY: `geteuid` has no preconditions and cannot fail.
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push("tickbridge");
        dir
    }
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent { path: String },
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
