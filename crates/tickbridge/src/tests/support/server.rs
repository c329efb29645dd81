//! In-process server harness: listener, queue and a ticking headless host
//! without the process guard.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use tickbridge_config::SocketEndpoint;
use tickbridge_types::{Command, Response};

use crate::client::BridgeClient;
use crate::context::BridgeContext;
use crate::dispatch::{CommandRegistry, Dispatcher, Handshake, HostInfo};
use crate::host::HeadlessHost;
use crate::pump::{ExecutionPump, PumpRegistration, TickScheduler};
use crate::queue::{CommandQueue, QueueSettings, SystemClock};
use crate::scene::Scene;
use crate::transport::{
    BridgeConnectionHandler, ConnectionSettings, ListenerHandle, SocketListener,
};

const TICK_INTERVAL: Duration = Duration::from_millis(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_TIMEOUT: Duration = Duration::from_millis(500);

pub struct HarnessOptions {
    /// Whether the execution pump is registered with the host.
    pub run_pump: bool,
    pub response_timeout: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            run_pump: true,
            response_timeout: Duration::from_secs(2),
        }
    }
}

pub struct BridgeHarness {
    client: BridgeClient,
    scene: Arc<Scene>,
    host: Arc<HeadlessHost>,
    host_thread: Option<thread::JoinHandle<u64>>,
    listener: Option<ListenerHandle>,
    _registration: Option<PumpRegistration>,
}

impl BridgeHarness {
    pub fn start(options: HarnessOptions) -> Self {
        let scene = Scene::new();
        let registry = scene
            .register(CommandRegistry::builder())
            .expect("scene handlers register")
            .build();
        let dispatcher = Dispatcher::new(
            registry,
            Handshake::new(HostInfo::new("headless", "test")),
        );
        let queue = CommandQueue::new(
            Arc::new(SystemClock),
            QueueSettings {
                poll_interval: POLL_INTERVAL,
                max_pending_responses: 64,
            },
        );
        let context = Arc::new(BridgeContext::new(
            dispatcher,
            queue,
            options.response_timeout,
        ));

        let host = Arc::new(HeadlessHost::new(TICK_INTERVAL));
        let registration = options.run_pump.then(|| {
            let scheduler: Arc<dyn TickScheduler> = Arc::clone(&host) as Arc<dyn TickScheduler>;
            ExecutionPump::new(Arc::clone(&context))
                .install(scheduler)
                .expect("pump installs on a fresh host")
        });
        let ticking = Arc::clone(&host);
        let host_thread = thread::spawn(move || ticking.run_until(|| false));

        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0))
            .expect("bind ephemeral port");
        let endpoint = listener.bound_endpoint();
        let handler = Arc::new(BridgeConnectionHandler::new(
            context,
            ConnectionSettings {
                read_timeout: READ_TIMEOUT,
                write_timeout: READ_TIMEOUT,
                max_request_bytes: 64 * 1024,
            },
        ));
        let listener = listener.start(handler, Some(50)).expect("listener starts");

        Self {
            client: BridgeClient::new(endpoint).with_timeout(Duration::from_secs(5)),
            scene,
            host,
            host_thread: Some(host_thread),
            listener: Some(listener),
            _registration: registration,
        }
    }

    pub fn send(&self, command: &Command) -> Response {
        self.client.send(command).expect("server answers")
    }

    /// Writes raw bytes, closes the write half and parses whatever comes back.
    pub fn send_raw(&self, bytes: &[u8]) -> Value {
        let SocketEndpoint::Tcp { host, port } = self.client.endpoint() else {
            panic!("harness listens on TCP");
        };
        let mut stream = TcpStream::connect((host.as_str(), *port)).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        stream.write_all(bytes).expect("write request");
        stream.shutdown(Shutdown::Write).expect("half close");
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).expect("read response");
        serde_json::from_slice(&reply).expect("response is JSON")
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn listener_running(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }
}

impl Drop for BridgeHarness {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
            let _ = listener.join();
        }
        self.host.stop();
        if let Some(thread) = self.host_thread.take() {
            let _ = thread.join();
        }
    }
}
