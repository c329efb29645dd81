use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Loopback interface the listener binds to by default.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Port the agent adapter expects the server on.
pub const DEFAULT_TCP_PORT: u16 = 9877;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Queued commands not answered within this window time out.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// Connections that stall mid-request are cut off after this long.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// A client that stops reading its response is dropped after this long.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;

/// Waiters re-check their deadline at least this often.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Roughly one frame at 60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Largest request accepted from a client.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Response slots retained before the oldest are evicted.
pub const DEFAULT_MAX_PENDING_RESPONSES: usize = 1024;

/// Consecutive accept failures before the listener gives up.
pub const DEFAULT_ACCEPT_ERROR_LIMIT: u32 = 50;

/// Host name reported when no real editor is attached.
pub const DEFAULT_HOST_NAME: &str = "headless";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default socket endpoint for the server.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}
