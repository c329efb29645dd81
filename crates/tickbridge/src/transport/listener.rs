//! Listener binding a socket endpoint and serving connections one at a time.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use tickbridge_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl SocketListener {
    /// Binds `endpoint`. Failure here is fatal for the server.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the endpoint is reachable from other
    /// machines, when the address cannot be resolved or bound, or when a Unix
    /// socket path is occupied.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        if !endpoint.is_loopback() {
            return Err(ListenerError::NotLoopback {
                endpoint: endpoint.to_string(),
            });
        }
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port } => ListenerKind::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => ListenerKind::Unix(bind_unix(path.as_std_path())?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Local TCP address, if bound over TCP.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// The endpoint actually bound, with an ephemeral TCP port resolved.
    #[must_use]
    pub fn bound_endpoint(&self) -> SocketEndpoint {
        match (&self.endpoint, self.local_addr()) {
            (SocketEndpoint::Tcp { host, .. }, Some(addr)) => {
                SocketEndpoint::tcp(host.clone(), addr.port())
            }
            (endpoint, _) => endpoint.clone(),
        }
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Connections are handed to `handler` serially on that thread. The loop
    /// aborts after `accept_error_limit` consecutive accept failures; `None`
    /// retries forever.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be switched to non-blocking mode.
    pub fn start(
        mut self,
        handler: Arc<dyn ConnectionHandler>,
        accept_error_limit: Option<u32>,
    ) -> Result<ListenerHandle, ListenerError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        if let Err(error) = match &self.listener {
            ListenerKind::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            ListenerKind::Unix(listener) => listener.set_nonblocking(true),
        } {
            #[cfg(unix)]
            cleanup_unix_socket(&self.endpoint);
            return Err(ListenerError::NonBlocking { source: error });
        }
        let endpoint = self.bound_endpoint();
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("tickbridge-listener".to_owned())
            .spawn(move || {
                let result =
                    run_accept_loop(&mut self, &shutdown_flag, handler.as_ref(), accept_error_limit);
                #[cfg(unix)]
                cleanup_unix_socket(&self.endpoint);
                result
            })
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            endpoint,
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    endpoint: SocketEndpoint,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<Result<(), ListenerError>>>,
}

impl ListenerHandle {
    /// Endpoint the listener is serving.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Asks the accept loop to stop after the current connection.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether the accept loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Waits for the accept loop to exit and reports why it stopped.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the loop, or
    /// [`ListenerError::ThreadPanic`].
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic)?,
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &mut SocketListener,
    shutdown: &AtomicBool,
    handler: &dyn ConnectionHandler,
    accept_error_limit: Option<u32>,
) -> Result<(), ListenerError> {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.bound_endpoint(),
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    let mut failures = 0_u32;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(listener) {
            Ok(Some(stream)) => {
                last_error = None;
                failures = 0;
                debug!(target: LISTENER_TARGET, "connection accepted");
                handler.handle(stream);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(source) => {
                failures = failures.saturating_add(1);
                let kind = source.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %source,
                        failures,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                if accept_error_limit.is_some_and(|limit| failures >= limit) {
                    error!(
                        target: LISTENER_TARGET,
                        error = %source,
                        failures,
                        "accept error limit reached; stopping listener"
                    );
                    return Err(ListenerError::AcceptLimit { failures, source });
                }
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, "socket listener stopped");
    Ok(())
}

fn accept_connection(listener: &mut SocketListener) -> Result<Option<ConnectionStream>, io::Error> {
    match &listener.listener {
        ListenerKind::Tcp(tcp) => match tcp.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                Ok(Some(ConnectionStream::Tcp(stream)))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        },
        #[cfg(unix)]
        ListenerKind::Unix(unix) => match unix.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                Ok(Some(ConnectionStream::Unix(stream)))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        },
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(source) => last_error = Some(ListenerError::BindTcp { addr, source }),
        }
    }
    Err(last_error.unwrap_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    }))
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                debug!(
                    target: LISTENER_TARGET,
                    path = %path.display(),
                    "removing stale unix socket"
                );
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let SocketEndpoint::Unix { path } = endpoint else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
