//! Verb table: an open registry of command handlers.

use castline_core::config::CommandsConfig;
use std::collections::HashMap;
use std::sync::Arc;

use crate::command::CommandSyntax;
use crate::handler::CommandHandler;
use crate::handlers::{
    AddRecipientHandler, AlertHandler, BroadcastHandler, HelpHandler, ListHandler,
    RemoveRecipientHandler,
};

/// Registry of verb handlers, kept in registration order for the help text.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn CommandHandler>>,
    index: HashMap<String, usize>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry with the configured alerts and the built-in verbs.
    pub fn with_defaults(config: &CommandsConfig) -> Self {
        let mut reg = Self::new();
        for alert in &config.alerts {
            reg.register(Arc::new(AlertHandler::from_config(alert)));
        }
        reg.register(Arc::new(BroadcastHandler));
        reg.register(Arc::new(ListHandler));
        reg.register(Arc::new(AddRecipientHandler));
        reg.register(Arc::new(RemoveRecipientHandler));
        reg.register(Arc::new(HelpHandler));
        reg
    }

    /// Register a handler. A handler for an existing verb replaces it in place.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let verb = handler.verb().to_lowercase();
        tracing::debug!("Registered command: {verb}");
        match self.index.get(&verb) {
            Some(&i) => {
                tracing::warn!("Command {verb} registered twice, replacing the first handler");
                self.handlers[i] = handler;
            }
            None => {
                self.index.insert(verb, self.handlers.len());
                self.handlers.push(handler);
            }
        }
    }

    /// Get a handler by (case-insensitive) verb.
    pub fn get(&self, verb: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.index
            .get(&verb.to_lowercase())
            .map(|&i| &self.handlers[i])
    }

    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.verb())
    }

    pub fn count(&self) -> usize {
        self.handlers.len()
    }

    /// Static verb table rendered for the `help` reply.
    pub fn help_text(&self, syntax: &CommandSyntax) -> String {
        let mut text = String::from("📋 *Comandos disponibles:*");
        for handler in &self.handlers {
            text.push('\n');
            text.push_str(&syntax.render(handler.verb()));
            text.push_str(handler.usage());
            text.push_str(" - ");
            text.push_str(handler.description());
        }
        text
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
