use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use tickbridge_config::{RuntimePaths, SocketEndpoint};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::files::atomic_write;
use super::marker::{LivenessMarker, process_alive};

/// A lock without a marker is left alone for this long, covering the window
/// between taking the lock and binding the listener.
const LOCK_GRACE: Duration = Duration::from_secs(5);

/// Owns the runtime artefacts of a running server and removes them on drop.
#[derive(Debug)]
pub(crate) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    marker: Option<LivenessMarker>,
}

impl ProcessGuard {
    pub(crate) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            marker: None,
        })
    }

    pub(crate) fn write_marker(&mut self, endpoint: &SocketEndpoint) -> Result<(), LaunchError> {
        let marker = LivenessMarker::for_current_process(endpoint);
        let path = self.paths.marker_path();
        marker.write(path)?;
        info!(
            target: PROCESS_TARGET,
            pid = marker.pid(),
            endpoint = %marker.endpoint(),
            file = %path.display(),
            "liveness marker written"
        );
        self.marker = Some(marker);
        Ok(())
    }

    pub(crate) fn write_health(&self, status: HealthState) -> Result<(), LaunchError> {
        let marker = self.marker.as_ref().ok_or(LaunchError::MissingMarker)?;
        let path = self.paths.health_path();
        let snapshot = HealthSnapshot::new(status, marker.pid())?;
        let mut body = serde_json::to_vec(&snapshot)?;
        body.push(b'\n');
        atomic_write(path, &body).map_err(|source| LaunchError::HealthWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            status = snapshot.status,
            file = %path.display(),
            "health snapshot updated"
        );
        Ok(())
    }

    pub(crate) fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, label) in [
            (self.paths.health_path(), "health"),
            (self.paths.marker_path(), "marker"),
            (self.paths.lock_path(), "lock"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path.display(),
                    error = %error,
                    "failed to remove {label} file"
                );
            }
        }
    }
}

/// Lifecycle stage recorded in the health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

impl HealthState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.as_str(),
            pid,
            timestamp,
        })
    }
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %paths.lock_path().display(),
                "acquired server lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    handle_existing_lock_with_grace(paths, LOCK_GRACE)
}

fn handle_existing_lock_with_grace(
    paths: &RuntimePaths,
    grace: Duration,
) -> Result<File, LaunchError> {
    if let Ok(Some(marker)) = LivenessMarker::read(paths.marker_path()) {
        let pid = marker.pid();
        match process_alive(pid) {
            Ok(true) => {
                info!(
                    target: PROCESS_TARGET,
                    pid,
                    "refusing to start: existing server alive"
                );
                return Err(LaunchError::AlreadyRunning { pid });
            }
            Ok(false) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid,
                    "existing server not detected; cleaning stale files"
                );
            }
            Err(source) => return Err(LaunchError::CheckProcess { pid, source }),
        }
    } else {
        // No readable marker: either a crashed server or one still starting.
        let Some(age) = lock_age(paths.lock_path())? else {
            return acquire_lock(paths);
        };
        if age < grace {
            info!(
                target: PROCESS_TARGET,
                age_ms = age.as_millis(),
                "refusing to start: lock is fresh and has no marker yet"
            );
            return Err(LaunchError::StartupInProgress {
                path: paths.lock_path().to_path_buf(),
                age_ms: age.as_millis(),
            });
        }
        warn!(
            target: PROCESS_TARGET,
            age_ms = age.as_millis(),
            "lock has no liveness marker; cleaning stale files"
        );
    }
    remove_file(paths.lock_path())?;
    remove_file(paths.marker_path())?;
    remove_file(paths.health_path())?;
    acquire_lock(paths)
}

/// Age of the lock file, or `None` when it vanished meanwhile.
fn lock_age(path: &Path) -> Result<Option<Duration>, LaunchError> {
    let modified = match fs::metadata(path).and_then(|metadata| metadata.modified()) {
        Ok(modified) => modified,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LaunchError::LockMetadata {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default(),
    ))
}

fn remove_file(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
