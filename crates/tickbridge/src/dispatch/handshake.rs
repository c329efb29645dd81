//! Built-in connectivity probe.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use tickbridge_types::{Command, Response};

/// Version of this server reported to clients.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of the host application reported by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Host application name.
    pub name: String,
    /// Host application version.
    pub version: String,
}

impl HostInfo {
    /// Describes a host.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Answers `handshake` with an echo and liveness metadata.
///
/// The session id is fixed when the server starts, so repeated handshakes
/// against the same process report the same id.
#[derive(Debug, Clone)]
pub struct Handshake {
    host: HostInfo,
    session_id: String,
}

impl Handshake {
    /// Creates the handshake responder for a server starting now.
    pub fn new(host: HostInfo) -> Self {
        let started = unix_millis(SystemTime::now());
        let session_id = format!("{}-{started}", host.name);
        Self { host, session_id }
    }

    /// Session id reported to clients.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn respond(&self, command: &Command) -> Response {
        let message = match command.get("message") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };
        Response::success()
            .with("message", format!("Received: {message}"))
            .with(
                "connection_info",
                json!({
                    "status": "Connected",
                    "host_name": self.host.name,
                    "host_version": self.host.version,
                    "server_version": SERVER_VERSION,
                    "timestamp": unix_millis(SystemTime::now()),
                    "session_id": self.session_id,
                }),
            )
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
