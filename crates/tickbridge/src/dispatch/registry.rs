//! Immutable name-to-handler table built once at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tickbridge_types::HANDSHAKE_COMMAND;

use super::errors::RegistryError;
use super::handler::CommandHandler;

/// Lookup table from command type to handler.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandRegistry")
            .field("commands", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    /// Registered command names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Accumulates handlers and validates their names.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl RegistryBuilder {
    /// Registers `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Rejects empty names, names already taken and the built-in handshake.
    pub fn register<H>(mut self, name: impl Into<String>, handler: H) -> Result<Self, RegistryError>
    where
        H: CommandHandler + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name == HANDSHAKE_COMMAND {
            return Err(RegistryError::Reserved { name });
        }
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            handlers: self.handlers,
        }
    }
}
