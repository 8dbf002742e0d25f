//! Command handler trait and per-invocation context.

use async_trait::async_trait;
use castline_core::error::Result;
use castline_core::types::Payload;
use castline_security::Sender;

use crate::command::Command;
use crate::router::CommandRouter;
use crate::services::Services;

/// Who issued a command, who it is addressed to, and how deep in a broadcast it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub sender: Sender,
    /// Canonical number that receives the command's effect and replies.
    pub target: String,
    /// 0 for a direct command, 1 inside a broadcast item.
    pub depth: u8,
}

impl Invocation {
    /// A command from a phone number, answered to the same number (the inbound message path).
    pub fn from_number(number: impl Into<String>) -> Self {
        let number = number.into();
        Self {
            sender: Sender::Number(number.clone()),
            target: number,
            depth: 0,
        }
    }

    /// A command addressed to `target` on behalf of `sender`.
    pub fn addressed(sender: Sender, target: impl Into<String>) -> Self {
        Self {
            sender,
            target: target.into(),
            depth: 0,
        }
    }

    /// The invocation used for one item of a broadcast started by `self`.
    pub fn nested(&self, target: impl Into<String>) -> Self {
        Self {
            sender: self.sender.clone(),
            target: target.into(),
            depth: self.depth.saturating_add(1),
        }
    }
}

/// What a handler can reach while executing.
pub struct CommandContext<'a> {
    pub invocation: &'a Invocation,
    pub router: &'a CommandRouter,
}

impl CommandContext<'_> {
    pub fn services(&self) -> &Services {
        self.router.services()
    }

    /// Send a text reply to the invocation target.
    pub async fn reply(&self, text: impl Into<String>) -> Result<()> {
        self.services()
            .session
            .send(&self.invocation.target, &Payload::text(text))
            .await
    }
}

/// A verb implementation registered in the [`crate::HandlerRegistry`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Lower-case verb this handler answers to.
    fn verb(&self) -> &str;

    /// One-line description for the help text.
    fn description(&self) -> &str;

    /// Argument hint appended to the verb in the help text, e.g. `:mensaje`.
    fn usage(&self) -> &str {
        ""
    }

    /// Whether the verb expands into a broadcast.
    fn fans_out(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &CommandContext<'_>, command: &Command) -> Result<()>;
}
