//! Routes commands to handlers and enforces the error contract.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use tickbridge_types::{Command, HANDSHAKE_COMMAND, Response};

use super::DISPATCH_TARGET;
use super::handler::Affinity;
use super::handshake::Handshake;
use super::registry::CommandRegistry;

/// Where a command must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Dispatch immediately on the calling thread.
    Inline,
    /// Hand to the execution pump and wait for the result.
    Queued,
}

/// Name-to-handler dispatcher with the built-in handshake.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: CommandRegistry,
    handshake: Handshake,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: CommandRegistry, handshake: Handshake) -> Self {
        Self {
            registry,
            handshake,
        }
    }

    /// Decides whether `kind` can be answered without the execution thread.
    ///
    /// The handshake and unknown types never touch host state and are routed
    /// inline. Registered handlers follow their declared affinity.
    pub fn route(&self, kind: &str) -> Route {
        if kind == HANDSHAKE_COMMAND {
            return Route::Inline;
        }
        match self.registry.get(kind).map(|handler| handler.affinity()) {
            Some(Affinity::ExecutionThread) => Route::Queued,
            Some(Affinity::AnyThread) | None => Route::Inline,
        }
    }

    /// Runs `command` and always produces exactly one response.
    pub fn dispatch(&self, command: Command) -> Response {
        let kind = command.kind().to_owned();
        if kind == HANDSHAKE_COMMAND {
            return self.handshake.respond(&command);
        }
        let Some(handler) = self.registry.get(&kind) else {
            debug!(target: DISPATCH_TARGET, command = %kind, "unknown command type");
            return Response::failure(format!("Unknown command type: {kind}"));
        };
        debug!(target: DISPATCH_TARGET, command = %kind, "dispatching command");
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(command))) {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(target: DISPATCH_TARGET, command = %kind, %error, "command failed");
                Response::from(error)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(target: DISPATCH_TARGET, command = %kind, panic = %message, "handler panicked");
                Response::failure(message)
            }
        }
    }

    /// Registered handlers.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned())
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::dispatch::{CommandHandler, FnHandler, HandlerError, HostInfo};

    mock! {
        Handler {}
        impl CommandHandler for Handler {
            fn handle(&self, command: Command) -> Result<Response, HandlerError>;
            fn affinity(&self) -> Affinity;
        }
    }

    fn dispatcher(registry: CommandRegistry) -> Dispatcher {
        Dispatcher::new(registry, Handshake::new(HostInfo::new("headless", "0.0.0")))
    }

    #[fixture]
    fn empty() -> Dispatcher {
        dispatcher(CommandRegistry::default())
    }

    #[rstest]
    fn unknown_type_is_reported(empty: Dispatcher) {
        let response = empty.dispatch(Command::new("teleport"));
        assert_eq!(
            serde_json::to_value(&response).expect("serialise"),
            json!({"success": false, "error": "Unknown command type: teleport"})
        );
    }

    #[rstest]
    fn handshake_echoes_message(empty: Dispatcher) {
        let response = empty.dispatch(Command::new("handshake").with_field("message", "hello"));
        assert!(response.is_success());
        assert_eq!(response.get("message"), Some(&json!("Received: hello")));
        let info = response.get("connection_info").expect("connection info");
        assert_eq!(info["status"], json!("Connected"));
        assert_eq!(info["host_name"], json!("headless"));
        assert_eq!(info["server_version"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn handler_receives_full_command() {
        let mut handler = MockHandler::new();
        handler
            .expect_handle()
            .withf(|command| command.str_field("actor_class") == Some("Cube"))
            .times(1)
            .returning(|_| Ok(Response::success().with("actor_name", "Cube_1")));
        let registry = CommandRegistry::builder()
            .register("spawn", handler)
            .expect("register spawn")
            .build();
        let response =
            dispatcher(registry).dispatch(Command::new("spawn").with_field("actor_class", "Cube"));
        assert_eq!(response.get("actor_name"), Some(&json!("Cube_1")));
    }

    #[test]
    fn handler_errors_keep_message_and_details() {
        let registry = CommandRegistry::builder()
            .register(
                "connect_pins",
                FnHandler::new(|_command: Command| {
                    Err(HandlerError::new("Pin not found: Exec").with_detail("suggestions", json!(["then"])))
                }),
            )
            .expect("register")
            .build();
        let response = dispatcher(registry).dispatch(Command::new("connect_pins"));
        assert_eq!(response.error(), Some("Pin not found: Exec"));
        assert_eq!(response.get("suggestions"), Some(&json!(["then"])));
    }

    #[test]
    fn handler_panics_become_failures() {
        let registry = CommandRegistry::builder()
            .register(
                "explode",
                FnHandler::new(|_command: Command| -> Result<Response, HandlerError> {
                    panic!("boom")
                }),
            )
            .expect("register")
            .build();
        let response = dispatcher(registry).dispatch(Command::new("explode"));
        assert!(!response.is_success());
        assert_eq!(response.error(), Some("boom"));
    }

    #[test]
    fn routes_by_affinity() {
        let mut state_free = MockHandler::new();
        state_free.expect_affinity().return_const(Affinity::AnyThread);
        let mut stateful = MockHandler::new();
        stateful
            .expect_affinity()
            .return_const(Affinity::ExecutionThread);
        let registry = CommandRegistry::builder()
            .register("ping", state_free)
            .and_then(|builder| builder.register("spawn", stateful))
            .expect("register")
            .build();
        let dispatcher = dispatcher(registry);
        assert_eq!(dispatcher.route("handshake"), Route::Inline);
        assert_eq!(dispatcher.route("ping"), Route::Inline);
        assert_eq!(dispatcher.route("spawn"), Route::Queued);
        assert_eq!(dispatcher.route("missing"), Route::Inline);
    }
}
