use async_trait::async_trait;
use castline_core::error::Result;

use crate::command::Command;
use crate::handler::{CommandContext, CommandHandler};

/// Replies with the verb table.
pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    fn verb(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Muestra esta ayuda"
    }

    async fn handle(&self, ctx: &CommandContext<'_>, _command: &Command) -> Result<()> {
        let text = ctx.router.handlers().help_text(&ctx.services().syntax);
        ctx.reply(text).await
    }
}
