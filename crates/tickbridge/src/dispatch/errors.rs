//! Error types for handler failures and registry construction.
//!
//! Handler errors never escape the dispatcher: they are converted into a
//! failure [`Response`] carrying the message and any diagnostic fields the
//! handler attached, such as suggested alternatives.

use serde_json::{Map, Value};
use thiserror::Error;

use tickbridge_types::Response;

/// Failure reported by a command handler.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    details: Map<String, Value>,
}

impl HandlerError {
    /// Creates an error with a client-facing message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Creates an error for a required argument that was absent.
    pub fn missing_field(field: &str) -> Self {
        Self::new(format!("Missing required field: {field}"))
    }

    /// Creates an error for an argument with the wrong shape.
    pub fn invalid_field(field: &str, expected: &str) -> Self {
        Self::new(format!("Invalid {field}: expected {expected}"))
    }

    /// Attaches a diagnostic field returned alongside the message.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic fields.
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}

impl From<HandlerError> for Response {
    fn from(error: HandlerError) -> Self {
        error
            .details
            .into_iter()
            .fold(Self::failure(error.message), |response, (key, value)| {
                response.with(key, value)
            })
    }
}

/// Errors raised while building a command registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A handler was registered without a name.
    #[error("command name must not be empty")]
    EmptyName,
    /// Two handlers claimed the same name.
    #[error("command '{name}' is already registered")]
    Duplicate {
        /// Name registered twice.
        name: String,
    },
    /// The name belongs to a built-in command.
    #[error("command '{name}' is reserved")]
    Reserved {
        /// Reserved name.
        name: String,
    },
}
