use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message returned when a queued command misses its deadline.
pub const TIMED_OUT_MESSAGE: &str = "Command timed out";

const RESERVED_KEYS: [&str; 2] = ["success", "error"];

/// Outcome of one command, written back to the client as a JSON object.
///
/// Successful responses carry handler-defined payload fields next to
/// `success`. Failed responses carry an `error` message and may carry extra
/// diagnostic fields such as suggested alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Response {
    /// A successful response with an empty payload.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
            payload: Map::new(),
        }
    }

    /// A failed response carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            payload: Map::new(),
        }
    }

    /// The response synthesised when a queued command times out.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::failure(TIMED_OUT_MESSAGE)
    }

    /// Adds a payload field. `success` and `error` are reserved and ignored.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a payload field in place. `success` and `error` are reserved and
    /// ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return;
        }
        self.payload.insert(key, value.into());
    }

    /// Whether the command succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Failure message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Looks up a payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// All payload fields.
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}
