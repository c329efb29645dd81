//! In-memory scene used by the standalone binary in place of an editor.
//!
//! The handlers mirror the shape of real editor commands closely enough for
//! agents and tests to exercise the full request path: they validate their
//! own arguments, mutate shared state and report names back to the caller.
//! All of them touch scene state and therefore run on the execution thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{Value, json};

use tickbridge_types::{Command, Response};

use crate::dispatch::{FnHandler, HandlerError, RegistryBuilder, RegistryError};

type Vector = [f64; 3];

const ORIGIN: Vector = [0.0, 0.0, 0.0];
const UNIT_SCALE: Vector = [1.0, 1.0, 1.0];
const MAX_SUGGESTIONS: usize = 5;
const DEFAULT_ACTOR_CLASS: &str = "Cube";

const BASIC_SHAPES: [(&str, &str); 4] = [
    ("cube", "/Engine/BasicShapes/Cube.Cube"),
    ("sphere", "/Engine/BasicShapes/Sphere.Sphere"),
    ("cylinder", "/Engine/BasicShapes/Cylinder.Cylinder"),
    ("cone", "/Engine/BasicShapes/Cone.Cone"),
];

const ACTOR_CLASSES: [&str; 5] = [
    "StaticMeshActor",
    "PointLight",
    "SpotLight",
    "DirectionalLight",
    "CameraActor",
];

/// An object placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    /// Unique name assigned at spawn.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Actor class.
    pub class: String,
    /// Static mesh asset for basic shapes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    /// World location.
    pub location: Vector,
    /// Rotation as pitch, yaw, roll in degrees.
    pub rotation: Vector,
    /// Per-axis scale.
    pub scale: Vector,
}

#[derive(Debug, Default)]
struct SceneState {
    actors: BTreeMap<String, Actor>,
    spawned: BTreeMap<String, u32>,
}

/// Shared scene state behind the demo command handlers.
#[derive(Debug, Default)]
pub struct Scene {
    state: Mutex<SceneState>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `spawn`, `get_all_scene_objects`, `modify_object` and
    /// `delete_actor` against this scene.
    ///
    /// # Errors
    ///
    /// Fails when one of the names is already registered.
    pub fn register(
        self: &Arc<Self>,
        builder: RegistryBuilder,
    ) -> Result<RegistryBuilder, RegistryError> {
        let spawn = Arc::clone(self);
        let list = Arc::clone(self);
        let modify = Arc::clone(self);
        let delete = Arc::clone(self);
        builder
            .register("spawn", FnHandler::new(move |command: Command| spawn.spawn(&command)))?
            .register(
                "get_all_scene_objects",
                FnHandler::new(move |_command: Command| list.list()),
            )?
            .register(
                "modify_object",
                FnHandler::new(move |command: Command| modify.modify(&command)),
            )?
            .register(
                "delete_actor",
                FnHandler::new(move |command: Command| delete.delete(&command)),
            )
    }

    /// Snapshot of an actor by name.
    #[must_use]
    pub fn actor(&self, name: &str) -> Option<Actor> {
        self.lock().actors.get(name).cloned()
    }

    /// Number of actors in the scene.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().actors.len()
    }

    /// Whether the scene is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn(&self, command: &Command) -> Result<Response, HandlerError> {
        let requested = match command.get("actor_class") {
            None | Some(Value::Null) => DEFAULT_ACTOR_CLASS,
            Some(value) => value
                .as_str()
                .ok_or_else(|| HandlerError::invalid_field("actor_class", "a string"))?,
        };
        let (class, mesh) = resolve_class(requested).ok_or_else(|| {
            HandlerError::new(format!("Failed to spawn actor of type {requested}"))
                .with_detail("supported_types", supported_types())
        })?;
        let location = vector_field(command, "location", ORIGIN)?;
        let rotation = vector_field(command, "rotation", ORIGIN)?;
        let scale = vector_field(command, "scale", UNIT_SCALE)?;

        let mut state = self.lock();
        let stem = mesh.map_or(class, |_| shape_stem(requested));
        let counter = state.spawned.entry(stem.clone()).or_default();
        *counter += 1;
        let name = format!("{stem}_{counter}");
        let label = command
            .str_field("actor_label")
            .map_or_else(|| name.clone(), str::to_owned);
        let actor = Actor {
            name: name.clone(),
            label: label.clone(),
            class: if mesh.is_some() {
                "StaticMeshActor".to_owned()
            } else {
                stem
            },
            mesh: mesh.map(str::to_owned),
            location,
            rotation,
            scale,
        };
        state.actors.insert(name.clone(), actor);
        Ok(Response::success()
            .with("actor_name", name)
            .with("actor_label", label))
    }

    fn list(&self) -> Result<Response, HandlerError> {
        let state = self.lock();
        let actors: Vec<&Actor> = state.actors.values().collect();
        let actors = serde_json::to_value(actors)
            .map_err(|error| HandlerError::new(format!("Failed to list actors: {error}")))?;
        Ok(Response::success().with("actors", actors))
    }

    fn modify(&self, command: &Command) -> Result<Response, HandlerError> {
        let name = required_str(command, "actor_name")?;
        let location = optional_vector(command, "location")?;
        let rotation = optional_vector(command, "rotation")?;
        let scale = optional_vector(command, "scale")?;

        let mut state = self.lock();
        let suggestions = suggest(&state, name);
        let actor = state
            .actors
            .get_mut(name)
            .ok_or_else(|| not_found(name, suggestions))?;
        let mut modified = Vec::new();
        for (field, value, target) in [
            ("location", location, &mut actor.location),
            ("rotation", rotation, &mut actor.rotation),
            ("scale", scale, &mut actor.scale),
        ] {
            if let Some(value) = value {
                *target = value;
                modified.push(field);
            }
        }
        if let Some(label) = command.str_field("actor_label") {
            label.clone_into(&mut actor.label);
            modified.push("label");
        }
        Ok(Response::success()
            .with("actor_name", name)
            .with("modified", json!(modified)))
    }

    fn delete(&self, command: &Command) -> Result<Response, HandlerError> {
        let name = required_str(command, "actor_name")?;
        let mut state = self.lock();
        if state.actors.remove(name).is_none() {
            let suggestions = suggest(&state, name);
            return Err(not_found(name, suggestions));
        }
        Ok(Response::success().with("actor_name", name))
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn resolve_class(requested: &str) -> Option<(String, Option<&'static str>)> {
    let lowered = requested.to_ascii_lowercase();
    if let Some(mesh) = BASIC_SHAPES
        .iter()
        .find(|(shape, _)| *shape == lowered)
        .map(|(_, mesh)| *mesh)
    {
        return Some((requested.to_owned(), Some(mesh)));
    }
    ACTOR_CLASSES
        .iter()
        .find(|class| class.eq_ignore_ascii_case(requested))
        .map(|class| ((*class).to_owned(), None))
}

fn shape_stem(requested: &str) -> String {
    let mut chars = requested.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
    })
}

fn supported_types() -> Value {
    BASIC_SHAPES
        .iter()
        .map(|(shape, _)| *shape)
        .chain(ACTOR_CLASSES)
        .collect()
}

fn required_str<'a>(command: &'a Command, field: &str) -> Result<&'a str, HandlerError> {
    command
        .str_field(field)
        .ok_or_else(|| HandlerError::missing_field(field))
}

fn vector_field(command: &Command, field: &str, default: Vector) -> Result<Vector, HandlerError> {
    Ok(optional_vector(command, field)?.unwrap_or(default))
}

fn optional_vector(command: &Command, field: &str) -> Result<Option<Vector>, HandlerError> {
    let Some(value) = command.get(field) else {
        return Ok(None);
    };
    let invalid = || HandlerError::invalid_field(field, "[x, y, z]");
    let components = value.as_array().ok_or_else(invalid)?;
    match components.as_slice() {
        [x, y, z] => Ok(Some([
            x.as_f64().ok_or_else(invalid)?,
            y.as_f64().ok_or_else(invalid)?,
            z.as_f64().ok_or_else(invalid)?,
        ])),
        _ => Err(invalid()),
    }
}

fn suggest(state: &SceneState, name: &str) -> Vec<String> {
    let needle = name.to_ascii_lowercase();
    let stem = needle.split('_').next().unwrap_or_default();
    state
        .actors
        .values()
        .filter(|actor| {
            let candidate = actor.name.to_ascii_lowercase();
            candidate.contains(&needle)
                || (!stem.is_empty() && candidate.starts_with(stem))
                || actor.label.eq_ignore_ascii_case(name)
        })
        .take(MAX_SUGGESTIONS)
        .map(|actor| actor.name.clone())
        .collect()
}

fn not_found(name: &str, suggestions: Vec<String>) -> HandlerError {
    let error = HandlerError::new(format!("Actor not found: {name}"));
    if suggestions.is_empty() {
        error
    } else {
        error.with_detail("suggestions", suggestions)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::dispatch::{CommandRegistry, Dispatcher, Handshake, HostInfo};

    #[fixture]
    fn scene() -> Arc<Scene> {
        Scene::new()
    }

    fn dispatcher(scene: &Arc<Scene>) -> Dispatcher {
        let registry = scene
            .register(CommandRegistry::builder())
            .expect("register scene handlers")
            .build();
        Dispatcher::new(registry, Handshake::new(HostInfo::new("headless", "0.0.0")))
    }

    #[rstest]
    #[case("cube", "Cube_1")]
    #[case("Sphere", "Sphere_1")]
    #[case("PointLight", "PointLight_1")]
    fn spawn_names_actors_after_their_type(
        scene: Arc<Scene>,
        #[case] class: &str,
        #[case] expected: &str,
    ) {
        let response = dispatcher(&scene).dispatch(
            Command::new("spawn")
                .with_field("actor_class", class)
                .with_field("location", json!([1.0, 2.0, 3.0])),
        );
        assert!(response.is_success(), "spawn failed: {response:?}");
        assert_eq!(response.get("actor_name"), Some(&json!(expected)));
        let actor = scene.actor(expected).expect("actor stored");
        assert_eq!(actor.location, [1.0, 2.0, 3.0]);
    }

    #[rstest]
    fn spawn_defaults_to_a_cube(scene: Arc<Scene>) {
        let response = dispatcher(&scene).dispatch(Command::new("spawn"));
        assert!(response.is_success(), "spawn failed: {response:?}");
        assert_eq!(response.get("actor_name"), Some(&json!("Cube_1")));
        let actor = scene.actor("Cube_1").expect("actor stored");
        assert_eq!(actor.class, "StaticMeshActor");
    }

    #[rstest]
    fn spawn_rejects_non_string_classes(scene: Arc<Scene>) {
        let response =
            dispatcher(&scene).dispatch(Command::new("spawn").with_field("actor_class", 5));
        assert!(!response.is_success());
        assert!(scene.is_empty());
    }

    #[rstest]
    fn spawn_counts_per_type(scene: Arc<Scene>) {
        let dispatcher = dispatcher(&scene);
        for _ in 0..2 {
            dispatcher.dispatch(Command::new("spawn").with_field("actor_class", "cube"));
        }
        assert!(scene.actor("Cube_2").is_some());
        assert_eq!(scene.len(), 2);
    }

    #[rstest]
    fn spawn_rejects_unknown_types(scene: Arc<Scene>) {
        let response =
            dispatcher(&scene).dispatch(Command::new("spawn").with_field("actor_class", "Dragon"));
        assert_eq!(response.error(), Some("Failed to spawn actor of type Dragon"));
        assert!(response.get("supported_types").is_some());
        assert!(scene.is_empty());
    }

    #[rstest]
    fn spawn_validates_vectors(scene: Arc<Scene>) {
        let response = dispatcher(&scene).dispatch(
            Command::new("spawn")
                .with_field("actor_class", "cube")
                .with_field("location", json!([1.0, 2.0])),
        );
        assert_eq!(response.error(), Some("Invalid location: expected [x, y, z]"));
    }

    #[rstest]
    fn modify_updates_requested_fields(scene: Arc<Scene>) {
        let dispatcher = dispatcher(&scene);
        dispatcher.dispatch(Command::new("spawn").with_field("actor_class", "cone"));
        let response = dispatcher.dispatch(
            Command::new("modify_object")
                .with_field("actor_name", "Cone_1")
                .with_field("scale", json!([2, 2, 2])),
        );
        assert_eq!(response.get("modified"), Some(&json!(["scale"])));
        let actor = scene.actor("Cone_1").expect("actor exists");
        assert_eq!(actor.scale, [2.0, 2.0, 2.0]);
        assert_eq!(actor.location, ORIGIN);
    }

    #[rstest]
    fn missing_actor_suggests_alternatives(scene: Arc<Scene>) {
        let dispatcher = dispatcher(&scene);
        dispatcher.dispatch(Command::new("spawn").with_field("actor_class", "cube"));
        let response =
            dispatcher.dispatch(Command::new("delete_actor").with_field("actor_name", "Cube_9"));
        assert_eq!(response.error(), Some("Actor not found: Cube_9"));
        assert_eq!(response.get("suggestions"), Some(&json!(["Cube_1"])));
    }

    #[rstest]
    fn delete_then_list(scene: Arc<Scene>) {
        let dispatcher = dispatcher(&scene);
        dispatcher.dispatch(Command::new("spawn").with_field("actor_class", "cube"));
        dispatcher.dispatch(Command::new("spawn").with_field("actor_class", "sphere"));
        let deleted =
            dispatcher.dispatch(Command::new("delete_actor").with_field("actor_name", "Cube_1"));
        assert!(deleted.is_success());
        let listed = dispatcher.dispatch(Command::new("get_all_scene_objects"));
        let actors = listed.get("actors").and_then(Value::as_array).expect("actor list");
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0]["name"], json!("Sphere_1"));
        assert_eq!(actors[0]["class"], json!("StaticMeshActor"));
    }
}
