use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the built-in connectivity probe.
pub const HANDSHAKE_COMMAND: &str = "handshake";

const TYPE_FIELD: &str = "type";

/// A decoded request naming one operation and carrying its arguments.
///
/// The transport only guarantees that `type` is a string. All other fields
/// are opaque here and validated by the handler that consumes the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Command {
    kind: String,
    fields: Map<String, Value>,
}

/// Reasons a JSON document is not a valid command.
#[derive(Debug, Error)]
pub enum CommandParseError {
    /// The document was valid JSON but not an object.
    #[error("command must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON kind that was received instead.
        found: &'static str,
    },
    /// The object lacked a `type` field.
    #[error("command is missing the 'type' field")]
    MissingType,
    /// The `type` field was present but not a string.
    #[error("command 'type' must be a string")]
    TypeNotString,
    /// The bytes were not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Command {
    /// Builds a command with no arguments.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Adds or replaces an argument. A `type` key renames the command.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == TYPE_FIELD {
            if let Value::String(kind) = value {
                self.kind = kind;
            }
            return self;
        }
        self.fields.insert(key, value);
        self
    }

    /// Operation name from the `type` field.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Looks up a handler-specific argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Looks up a string argument.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// All arguments except `type`.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Decodes a command from raw bytes.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are not JSON or the document is not a command.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommandParseError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::try_from(value)
    }
}

impl TryFrom<Value> for Command {
    type Error = CommandParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err(CommandParseError::NotAnObject {
                found: json_kind(&value),
            });
        };
        match fields.remove(TYPE_FIELD) {
            Some(Value::String(kind)) => Ok(Self { kind, fields }),
            Some(_) => Err(CommandParseError::TypeNotString),
            None => Err(CommandParseError::MissingType),
        }
    }
}

impl From<Command> for Value {
    fn from(command: Command) -> Self {
        let Command { kind, mut fields } = command;
        fields.insert(TYPE_FIELD.to_owned(), Self::String(kind));
        Self::Object(fields)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
