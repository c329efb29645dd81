//! Pid and endpoint marker read by companion processes.
//!
//! The marker is two lines: the server pid, then the TCP port or Unix socket
//! path it listens on. A companion reads it to decide whether a server is
//! already running and where to connect.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;

use tickbridge_config::SocketEndpoint;

use super::files::atomic_write;

/// Where a running server can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerEndpoint {
    /// Loopback TCP port.
    Port(u16),
    /// Unix domain socket path.
    Path(Utf8PathBuf),
}

impl MarkerEndpoint {
    /// Derives the marker endpoint from a bound socket endpoint.
    #[must_use]
    pub fn from_endpoint(endpoint: &SocketEndpoint) -> Self {
        match endpoint {
            SocketEndpoint::Tcp { port, .. } => Self::Port(*port),
            SocketEndpoint::Unix { path } => Self::Path(path.clone()),
        }
    }
}

impl fmt::Display for MarkerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(port) => write!(formatter, "{port}"),
            Self::Path(path) => write!(formatter, "{path}"),
        }
    }
}

/// Contents of the liveness marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessMarker {
    pid: u32,
    endpoint: MarkerEndpoint,
}

impl LivenessMarker {
    /// Builds a marker for `pid` listening on `endpoint`.
    #[must_use]
    pub fn new(pid: u32, endpoint: MarkerEndpoint) -> Self {
        Self { pid, endpoint }
    }

    /// Marker describing the current process.
    #[must_use]
    pub fn for_current_process(endpoint: &SocketEndpoint) -> Self {
        Self::new(std::process::id(), MarkerEndpoint::from_endpoint(endpoint))
    }

    /// Recorded process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Recorded endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &MarkerEndpoint {
        &self.endpoint
    }

    /// Parses marker text.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Parse`] when either line is missing or the pid
    /// is not a number.
    pub fn parse(text: &str) -> Result<Self, MarkerError> {
        let mut lines = text.lines().map(str::trim);
        let pid = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| MarkerError::Parse {
                reason: "missing pid line".to_owned(),
            })?
            .parse::<u32>()
            .map_err(|error| MarkerError::Parse {
                reason: format!("invalid pid: {error}"),
            })?;
        let location = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| MarkerError::Parse {
                reason: "missing endpoint line".to_owned(),
            })?;
        let endpoint = location.parse::<u16>().map_or_else(
            |_| MarkerEndpoint::Path(Utf8PathBuf::from(location)),
            MarkerEndpoint::Port,
        );
        Ok(Self::new(pid, endpoint))
    }

    /// Reads the marker at `path`, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn read(path: &Path) -> Result<Option<Self>, MarkerError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MarkerError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Atomically writes the marker to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Write`] when the file cannot be replaced.
    pub fn write(&self, path: &Path) -> Result<(), MarkerError> {
        atomic_write(path, self.to_string().as_bytes()).map_err(|source| MarkerError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether the recorded pid names a live process.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the probe is inconclusive.
    pub fn is_alive(&self) -> Result<bool, Errno> {
        process_alive(self.pid)
    }
}

impl fmt::Display for LivenessMarker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "{}", self.pid)?;
        writeln!(formatter, "{}", self.endpoint)
    }
}

pub(super) fn process_alive(pid: u32) -> Result<bool, Errno> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(errno),
    }
}

/// Errors raised while reading or writing the liveness marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// The marker file could not be read.
    #[error("failed to read liveness marker '{path}': {source}")]
    Read {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The marker file could not be written.
    #[error("failed to write liveness marker '{path}': {source}")]
    Write {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The marker contents were not understood.
    #[error("malformed liveness marker: {reason}")]
    Parse {
        /// What was wrong with the contents.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn writes_pid_then_port() {
        let marker = LivenessMarker::new(4242, MarkerEndpoint::Port(9877));
        assert_eq!(marker.to_string(), "4242\n9877\n");
    }

    #[rstest]
    #[case("4242\n9877\n", MarkerEndpoint::Port(9877))]
    #[case("4242\n/run/tickbridge.sock\n", MarkerEndpoint::Path("/run/tickbridge.sock".into()))]
    #[case("  4242 \r\n9877", MarkerEndpoint::Port(9877))]
    fn parses_marker_text(#[case] text: &str, #[case] endpoint: MarkerEndpoint) {
        let marker = LivenessMarker::parse(text).expect("marker should parse");
        assert_eq!(marker.pid(), 4242);
        assert_eq!(marker.endpoint(), &endpoint);
    }

    #[rstest]
    #[case("")]
    #[case("4242\n")]
    #[case("abc\n9877\n")]
    fn rejects_incomplete_markers(#[case] text: &str) {
        let error = LivenessMarker::parse(text).expect_err("marker should be rejected");
        assert!(matches!(error, MarkerError::Parse { .. }));
    }

    #[test]
    fn missing_marker_reads_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let marker = LivenessMarker::read(&dir.path().join("tickbridge.pid")).expect("read");
        assert!(marker.is_none());
    }

    #[test]
    fn written_marker_reads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tickbridge.pid");
        let marker = LivenessMarker::for_current_process(&SocketEndpoint::tcp("127.0.0.1", 40123));
        marker.write(&path).expect("write marker");
        let read = LivenessMarker::read(&path).expect("read").expect("marker present");
        assert_eq!(read, marker);
        assert!(read.is_alive().expect("probe current pid"));
    }

    #[test]
    fn pid_zero_is_never_alive() {
        assert_eq!(process_alive(0), Ok(false));
    }
}
