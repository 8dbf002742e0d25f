//! Command router: authorization, parsing and dispatch to verb handlers.

use castline_core::error::{CastlineError, Result};
use std::sync::Arc;

use crate::handler::{CommandContext, Invocation};
use crate::registry::HandlerRegistry;
use crate::services::Services;

pub struct CommandRouter {
    handlers: HandlerRegistry,
    services: Arc<Services>,
}

impl CommandRouter {
    pub fn new(handlers: HandlerRegistry, services: Arc<Services>) -> Self {
        tracing::info!("🧭 Command router ready: {} verb(s)", handlers.count());
        Self { handlers, services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Authorize, parse and execute `raw` on behalf of `invocation`.
    ///
    /// Fan-out verbs are refused with [`CastlineError::NestedBroadcast`] when
    /// the invocation already runs inside a broadcast item.
    pub async fn route(&self, invocation: &Invocation, raw: &str) -> Result<()> {
        self.services.allowlist.authorize(&invocation.sender)?;

        let syntax = &self.services.syntax;
        let Some(mut command) = syntax.parse(raw) else {
            return Err(CastlineError::UnknownCommand(raw.trim().to_string()));
        };
        let handler = self
            .handlers
            .get(&command.verb)
            .cloned()
            .ok_or_else(|| CastlineError::UnknownCommand(syntax.render(&command.verb)))?;

        command.is_nested = handler.fans_out();
        if invocation.depth > 0 && command.is_nested {
            return Err(CastlineError::NestedBroadcast(syntax.render(&command.verb)));
        }

        tracing::info!(
            "📨 {} from {} → {}",
            syntax.render(&command.verb),
            invocation.sender.label(),
            invocation.target
        );
        let ctx = CommandContext {
            invocation,
            router: self,
        };
        handler.handle(&ctx, &command).await
    }
}
