//! Behavioural tests covering request handling over a live socket.

use std::cell::RefCell;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use tickbridge_types::{Command, HANDSHAKE_COMMAND, Response};

use crate::tests::support::{BridgeHarness, HarnessOptions};

#[derive(Default)]
pub struct BridgeWorld {
    harness: Option<BridgeHarness>,
    responses: Vec<Value>,
}

impl BridgeWorld {
    fn harness(&self) -> &BridgeHarness {
        self.harness.as_ref().expect("bridge should be started")
    }

    fn record(&mut self, response: &Response) {
        let value = serde_json::to_value(response).expect("responses serialise");
        self.responses.push(value);
    }

    fn last(&self) -> &Value {
        self.responses.last().expect("a response should be recorded")
    }
}

#[fixture]
fn world() -> RefCell<BridgeWorld> {
    RefCell::new(BridgeWorld::default())
}

#[given("a running bridge")]
fn given_running_bridge(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().harness = Some(BridgeHarness::start(HarnessOptions::default()));
}

#[given("a bridge without an execution pump")]
fn given_bridge_without_pump(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().harness = Some(BridgeHarness::start(HarnessOptions {
        run_pump: false,
        response_timeout: Duration::from_millis(150),
    }));
}

#[when("the client sends a handshake with message \"{message}\"")]
fn when_handshake(world: &RefCell<BridgeWorld>, message: String) {
    let command = Command::new(HANDSHAKE_COMMAND).with_field("message", message);
    let response = world.borrow().harness().send(&command);
    world.borrow_mut().record(&response);
}

#[when("the client sends a command of type \"{kind}\"")]
fn when_command_of_type(world: &RefCell<BridgeWorld>, kind: String) {
    let response = world.borrow().harness().send(&Command::new(kind));
    world.borrow_mut().record(&response);
}

#[when("the client writes \"{raw}\" and closes the connection")]
fn when_raw_bytes(world: &RefCell<BridgeWorld>, raw: String) {
    let value = world.borrow().harness().send_raw(raw.as_bytes());
    world.borrow_mut().responses.push(value);
}

#[when("the client spawns a \"{actor_class}\"")]
fn when_spawn(world: &RefCell<BridgeWorld>, actor_class: String) {
    let command = Command::new("spawn")
        .with_field("actor_class", actor_class)
        .with_field("location", serde_json::json!([0.0, 0.0, 100.0]));
    let response = world.borrow().harness().send(&command);
    world.borrow_mut().record(&response);
}

#[then("every response succeeded")]
fn then_every_response_succeeded(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    assert!(!world.responses.is_empty(), "no responses recorded");
    for response in &world.responses {
        assert_eq!(response["success"], true, "unexpected failure: {response}");
        assert!(response.get("error").is_none(), "success carries no error");
    }
}

#[then("the handshake echoes \"{expected}\"")]
fn then_handshake_echoes(world: &RefCell<BridgeWorld>, expected: String) {
    assert_eq!(world.borrow().last()["message"], expected.as_str());
}

#[then("the handshake responses share one session id")]
fn then_handshake_session_stable(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    let sessions: Vec<&Value> = world
        .responses
        .iter()
        .map(|response| &response["connection_info"]["session_id"])
        .collect();
    assert!(sessions.len() >= 2, "expected at least two handshakes");
    assert!(sessions.iter().all(|session| session.is_string()));
    assert!(sessions.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        world.last()["connection_info"]["status"],
        "Connected"
    );
}

#[then("the last response failed with \"{expected}\"")]
fn then_failed_with(world: &RefCell<BridgeWorld>, expected: String) {
    let world = world.borrow();
    let last = world.last();
    assert_eq!(last["success"], false);
    assert_eq!(last["error"], expected.as_str());
}

#[then("the last response failed mentioning \"{fragment}\"")]
fn then_failed_mentioning(world: &RefCell<BridgeWorld>, fragment: String) {
    let world = world.borrow();
    let last = world.last();
    assert_eq!(last["success"], false);
    let error = last["error"].as_str().expect("error should be a string");
    assert!(error.contains(&fragment), "unexpected error: {error}");
}

#[then("the last response names actor \"{name}\"")]
fn then_names_actor(world: &RefCell<BridgeWorld>, name: String) {
    assert_eq!(world.borrow().last()["actor_name"], name.as_str());
}

#[then("the last response lists supported types")]
fn then_lists_supported_types(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    let supported = world.last()["supported_types"]
        .as_array()
        .expect("supported_types should be an array");
    assert!(supported.iter().any(|entry| entry == "cube"));
}

#[then("the scene contains actor \"{name}\"")]
fn then_scene_contains(world: &RefCell<BridgeWorld>, name: String) {
    let world = world.borrow();
    let actor = world
        .harness()
        .scene()
        .actor(&name)
        .expect("actor should exist in the scene");
    assert_eq!(actor.class, "StaticMeshActor");
}

#[then("the bridge keeps listening")]
fn then_keeps_listening(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    assert!(world.harness().listener_running());
    let response = world
        .harness()
        .send(&Command::new(HANDSHAKE_COMMAND).with_field("message", "still there?"));
    assert!(response.is_success());
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Handshake is answered on repeated connections"
)]
fn handshake_is_idempotent(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Unknown command types are rejected"
)]
fn unknown_command_rejected(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Malformed input is reported"
)]
fn malformed_input_reported(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Spawning a supported shape"
)]
fn spawn_supported_shape(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Spawning an unsupported type"
)]
fn spawn_unsupported_type(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_bridge.feature",
    name = "Queued commands time out without an execution pump"
)]
fn queued_command_times_out(world: RefCell<BridgeWorld>) {
    drop(world);
}
