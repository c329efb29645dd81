//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use tickbridge_config::RuntimePaths;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::CommandRegistry;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::host::HeadlessHost;
use crate::pump::{ExecutionPump, PumpRegistration, TickScheduler};
use crate::scene::Scene;
use crate::transport::{
    BridgeConnectionHandler, ConnectionSettings, ListenerError, ListenerHandle, SocketListener,
};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the server runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the server using the production collaborators.
///
/// # Errors
///
/// Returns the first fatal [`LaunchError`]; a failure to bind the listen
/// socket is the common case.
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(),
    })
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    let scene = Scene::new();
    let registry = scene.register(CommandRegistry::builder())?.build();
    let server = bootstrap_with(&loader, reporter.as_ref(), registry)?;
    let config = server.config();
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.listen_socket(),
        "starting server runtime"
    );
    let stop = Arc::new(AtomicBool::new(false));
    shutdown.register(Arc::clone(&stop))?;

    let mut guard = ProcessGuard::acquire(RuntimePaths::from_config(config)?)?;
    info!(
        target: PROCESS_TARGET,
        runtime_dir = %guard.paths().runtime_dir().display(),
        "runtime directory prepared"
    );
    let listener = SocketListener::bind(config.listen_socket()).inspect_err(|error| {
        reporter.listener_failed(error);
    })?;
    guard.write_marker(&listener.bound_endpoint())?;
    guard.write_health(HealthState::Starting)?;

    let host = Arc::new(HeadlessHost::new(config.tick_interval()));
    let scheduler: Arc<dyn TickScheduler> = Arc::clone(&host) as Arc<dyn TickScheduler>;
    let pump = ExecutionPump::new(Arc::clone(server.context()));
    let registration = pump.install(scheduler)?;
    reporter.pump_registered();

    let handler = Arc::new(BridgeConnectionHandler::new(
        Arc::clone(server.context()),
        ConnectionSettings::from_config(config),
    ));
    let listener_handle = listener.start(handler, config.accept_error_limit())?;
    reporter.listener_ready(listener_handle.endpoint());
    guard.write_health(HealthState::Ready)?;

    host.run_until(|| stop.load(Ordering::SeqCst) || listener_handle.is_finished());

    guard.write_health(HealthState::Stopping)?;
    wind_down(&host, listener_handle, registration).inspect_err(|error| {
        reporter.listener_failed(error);
    })?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

/// Stops accepting and keeps ticking until the connection in flight has been
/// answered, then detaches the pump and stops the host.
fn wind_down(
    host: &HeadlessHost,
    listener: ListenerHandle,
    registration: PumpRegistration,
) -> Result<(), ListenerError> {
    listener.shutdown();
    host.run_until(|| listener.is_finished());
    let joined = listener.join();
    drop(registration);
    host.stop();
    joined
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use serde_json::json;
    use tickbridge_config::SocketEndpoint;

    use super::*;
    use crate::client::BridgeClient;
    use crate::context::BridgeContext;
    use crate::dispatch::{Dispatcher, FnHandler, Handshake, HostInfo};
    use crate::queue::{CommandQueue, QueueSettings, SystemClock};
    use crate::{Command, Response};

    const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

    fn echo_context() -> Arc<BridgeContext> {
        let registry = CommandRegistry::builder()
            .register(
                "echo",
                FnHandler::new(|command: Command| {
                    Ok(Response::success().with("echo", command.get("value").cloned()))
                }),
            )
            .expect("echo registers")
            .build();
        let queue = CommandQueue::new(
            Arc::new(SystemClock),
            QueueSettings {
                poll_interval: Duration::from_millis(10),
                max_pending_responses: 8,
            },
        );
        Arc::new(BridgeContext::new(
            Dispatcher::new(registry, Handshake::new(HostInfo::new("headless", "0.0.0"))),
            queue,
            RESPONSE_TIMEOUT,
        ))
    }

    #[test]
    fn wind_down_answers_the_command_in_flight() {
        let context = echo_context();
        let host = Arc::new(HeadlessHost::new(Duration::from_millis(1)));
        let scheduler: Arc<dyn TickScheduler> = Arc::clone(&host) as Arc<dyn TickScheduler>;
        let registration = ExecutionPump::new(Arc::clone(&context))
            .install(scheduler)
            .expect("pump installs");
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        let endpoint = listener.bound_endpoint();
        let handler = Arc::new(BridgeConnectionHandler::new(
            Arc::clone(&context),
            ConnectionSettings {
                read_timeout: Duration::from_millis(500),
                write_timeout: Duration::from_millis(500),
                max_request_bytes: 4096,
            },
        ));
        let listener = listener.start(handler, None).expect("start listener");

        let client = thread::spawn(move || {
            BridgeClient::new(endpoint)
                .with_timeout(Duration::from_secs(10))
                .send(&Command::new("echo").with_field("value", 7))
        });
        let deadline = Instant::now() + Duration::from_secs(2);
        while context.queue().depth() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(context.queue().depth(), 1, "command should be queued");

        let started = Instant::now();
        wind_down(&host, listener, registration).expect("listener stops cleanly");
        let response = client
            .join()
            .expect("client thread")
            .expect("client receives a response");

        assert!(response.is_success(), "{response:?}");
        assert_eq!(response.get("echo"), Some(&json!(7)));
        assert!(started.elapsed() < RESPONSE_TIMEOUT);
        assert!(host.is_stopped());
        assert_eq!(host.callback_count(), 0);
    }
}
